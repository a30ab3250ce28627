//! Crash recovery testing for OrbitalDB.
//!
//! A crash is simulated by closing the database and then driving the log
//! and journal directly, leaving them exactly as a process killed at a
//! given [`CrashPoint`] would. Reopening must then resolve the journal and
//! serve the state the interrupted mutation was heading for, or the state
//! before it for a compaction that never installed. The `*Recovered`
//! points stop after recovery has run but before the index is rebuilt.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orbital_testkit::crash::{CrashPoint, CrashRecoveryHarness};
//!
//! let mut harness = CrashRecoveryHarness::new();
//! harness.simulate(CrashPoint::InsertTornFrame).unwrap();
//! assert!(harness.recover_and_check(CrashPoint::InsertTornFrame).passed);
//! ```

use crate::fixtures::{doc, TestCatalog};
use orbital_core::{
    recover, CollectionPaths, CoreError, CoreResult, Document, DocumentId, IndexMirror, Journal,
    LogStore, Mutation, MutationKind, RecoveryOutcome,
};
use orbital_storage::{StorageBackend, StorageError, StorageResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

const COLLECTION: &str = "crashy";

/// Points at which a crash can be simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CrashPoint {
    /// Insert journaled, nothing appended.
    InsertJournaled,
    /// Insert journaled, half of the frame appended.
    InsertTornFrame,
    /// Insert journaled and appended, journal not cleared.
    InsertAppended,
    /// Delete journaled, frame still live.
    DeleteJournaled,
    /// Delete journaled and tombstoned, journal not cleared.
    DeleteTombstoned,
    /// Compaction journaled, staging file partly written.
    CompactStaged,
    /// Compaction journaled and installed, journal not cleared.
    CompactInstalled,
    /// Insert journaled and resolved by recovery, index not yet rebuilt.
    InsertRecovered,
    /// Compaction installed and resolved by recovery, index not yet rebuilt.
    CompactRecovered,
}

impl CrashPoint {
    /// Every crash point.
    pub const ALL: [Self; 9] = [
        Self::InsertJournaled,
        Self::InsertTornFrame,
        Self::InsertAppended,
        Self::DeleteJournaled,
        Self::DeleteTombstoned,
        Self::CompactStaged,
        Self::CompactInstalled,
        Self::InsertRecovered,
        Self::CompactRecovered,
    ];

    /// The mutation interrupted at this point.
    #[must_use]
    pub const fn kind(self) -> MutationKind {
        match self {
            Self::InsertJournaled
            | Self::InsertTornFrame
            | Self::InsertAppended
            | Self::InsertRecovered => MutationKind::Insert,
            Self::DeleteJournaled | Self::DeleteTombstoned => MutationKind::Delete,
            Self::CompactStaged | Self::CompactInstalled | Self::CompactRecovered => {
                MutationKind::Compact
            }
        }
    }

    /// What reopening should report.
    #[must_use]
    pub fn expected_outcome(self) -> RecoveryOutcome {
        match self {
            Self::InsertJournaled | Self::InsertTornFrame | Self::DeleteJournaled => {
                RecoveryOutcome::Replayed(self.kind())
            }
            Self::InsertAppended | Self::DeleteTombstoned | Self::CompactInstalled => {
                RecoveryOutcome::AlreadyApplied(self.kind())
            }
            Self::CompactStaged => RecoveryOutcome::RolledBack(self.kind()),
            Self::InsertRecovered | Self::CompactRecovered => RecoveryOutcome::Clean,
        }
    }
}

/// Result of a crash recovery test.
#[derive(Debug, Clone, Serialize)]
pub struct CrashRecoveryResult {
    /// The crash point tested.
    pub point: CrashPoint,
    /// Whether the test passed.
    pub passed: bool,
    /// Expected documents after recovery.
    pub expected_documents: usize,
    /// Actual documents after recovery.
    pub actual_documents: usize,
    /// The first problem found.
    pub error: Option<String>,
}

/// Leaves a collection mid-mutation and checks what reopening makes of it.
pub struct CrashRecoveryHarness {
    fixture: TestCatalog,
    expected: BTreeMap<DocumentId, Document>,
}

impl CrashRecoveryHarness {
    /// Creates a harness whose collection holds three documents, one of
    /// them overwritten and one deleted so the log has dead frames.
    ///
    /// # Panics
    ///
    /// Panics if seeding fails.
    #[must_use]
    pub fn new() -> Self {
        let fixture = TestCatalog::new();
        let mut expected = BTreeMap::new();
        {
            let handle = fixture.collection(COLLECTION);
            let mut collection = handle.lock();
            let seed = [
                doc(serde_json::json!({ "id": 1, "name": "ada" })),
                doc(serde_json::json!({ "id": 2, "name": "grace" })),
                doc(serde_json::json!({ "id": "x", "name": "temp" })),
                doc(serde_json::json!({ "id": 3, "name": "edsger" })),
                doc(serde_json::json!({ "id": 2, "name": "grace hopper" })),
            ];
            for document in seed {
                let id = collection.insert(document.clone()).expect("Failed to seed");
                expected.insert(id, document);
            }
            let gone = DocumentId::from("x");
            collection.delete(&gone).expect("Failed to seed");
            expected.remove(&gone);
        }
        Self { fixture, expected }
    }

    /// Returns the state the collection should hold after recovery.
    #[must_use]
    pub fn expected(&self) -> &BTreeMap<DocumentId, Document> {
        &self.expected
    }

    /// Closes the database and leaves the collection as a crash at `point`
    /// would.
    ///
    /// # Errors
    ///
    /// Returns an error if the files cannot be manipulated.
    pub fn simulate(&mut self, point: CrashPoint) -> CoreResult<()> {
        self.fixture.close();

        let paths = CollectionPaths::new(self.fixture.path(), COLLECTION);
        let mut log = LogStore::open(&paths.log, false)?;
        let mut journal = Journal::new(&paths.journal, COLLECTION).with_sync_writes(false);

        match point {
            CrashPoint::InsertJournaled
            | CrashPoint::InsertTornFrame
            | CrashPoint::InsertAppended
            | CrashPoint::InsertRecovered => {
                let document = doc(serde_json::json!({ "id": 4, "name": "barbara" }));
                let frame = orbital_codec::encode(&document, false)?;
                journal.begin(Mutation::Insert {
                    document: document.clone(),
                    offset: log.size()?,
                    frame_len: frame.len() as u64,
                })?;
                match point {
                    CrashPoint::InsertTornFrame => {
                        log.append(&frame[..frame.len() / 2])?;
                    }
                    CrashPoint::InsertAppended => {
                        log.append(&frame)?;
                    }
                    _ => {}
                }
                self.expected.insert(DocumentId::Int(4), document);
            }
            CrashPoint::DeleteJournaled | CrashPoint::DeleteTombstoned => {
                let id = DocumentId::Int(1);
                let offset = live_entries(&log)?
                    .into_iter()
                    .find_map(|(live, offset)| (live == id).then_some(offset))
                    .ok_or_else(|| CoreError::invalid_operation("seed document 1 is missing"))?;
                journal.begin(Mutation::Delete {
                    id: id.clone(),
                    offset,
                })?;
                if point == CrashPoint::DeleteTombstoned {
                    log.tombstone(offset)?;
                }
                self.expected.remove(&id);
            }
            CrashPoint::CompactStaged => {
                journal.begin(Mutation::Compact)?;
                let bytes = fs::read(&paths.log)?;
                fs::write(log.backend().staging_path(), &bytes[..bytes.len() / 3])?;
            }
            CrashPoint::CompactInstalled | CrashPoint::CompactRecovered => {
                journal.begin(Mutation::Compact)?;
                let live = live_entries(&log)?;
                log.compact(&live)?;
            }
        }

        if matches!(point, CrashPoint::InsertRecovered | CrashPoint::CompactRecovered) {
            let mut mirror = IndexMirror::new(&paths.index_snapshot, &paths.index_deltas)
                .with_sync_writes(false);
            recover(&mut journal, &mut log, Some(&mut mirror))?;
        }
        Ok(())
    }

    /// Reopens the database and compares it with [`expected`](Self::expected).
    ///
    /// # Panics
    ///
    /// Panics if the catalog cannot be reopened.
    pub fn recover_and_check(&mut self, point: CrashPoint) -> CrashRecoveryResult {
        self.fixture.reopen();
        let mut result = CrashRecoveryResult {
            point,
            passed: false,
            expected_documents: self.expected.len(),
            actual_documents: 0,
            error: None,
        };

        match self.check(point, &mut result) {
            Ok(()) => result.passed = true,
            Err(message) => result.error = Some(message),
        }
        result
    }

    fn check(&self, point: CrashPoint, result: &mut CrashRecoveryResult) -> Result<(), String> {
        let handle = self
            .fixture
            .catalog()
            .collection(COLLECTION)
            .map_err(|e| format!("reopen failed: {e}"))?;
        let collection = handle.lock();
        result.actual_documents = collection.len();

        let outcome = collection.last_recovery();
        if *outcome != point.expected_outcome() {
            return Err(format!(
                "recovery reported {outcome:?}, expected {:?}",
                point.expected_outcome()
            ));
        }

        let paths = CollectionPaths::new(self.fixture.path(), COLLECTION);
        if paths.journal.exists() {
            return Err("journal was not cleared".to_string());
        }
        let mut staging = paths.log.into_os_string();
        staging.push(".tmp");
        if std::path::Path::new(&staging).exists() {
            return Err("staging file was left behind".to_string());
        }

        let ids = collection.ids();
        let expected_ids: Vec<DocumentId> = self.expected.keys().cloned().collect();
        if ids != expected_ids {
            return Err(format!("ids {ids:?}, expected {expected_ids:?}"));
        }
        for (id, expected) in &self.expected {
            let actual = collection.get(id).map_err(|e| e.to_string())?;
            if actual.as_ref() != Some(expected) {
                return Err(format!("document {id} is {actual:?}"));
            }
        }

        let report = collection.verify().map_err(|e| e.to_string())?;
        if !report.is_consistent() {
            return Err(format!("verify found {:?}", report.issues));
        }
        Ok(())
    }

    /// Runs every crash point against a fresh harness.
    #[must_use]
    pub fn run_all() -> Vec<CrashRecoveryResult> {
        CrashPoint::ALL
            .iter()
            .map(|&point| {
                let mut harness = Self::new();
                match harness.simulate(point) {
                    Ok(()) => harness.recover_and_check(point),
                    Err(e) => CrashRecoveryResult {
                        point,
                        passed: false,
                        expected_documents: harness.expected.len(),
                        actual_documents: 0,
                        error: Some(format!("simulation failed: {e}")),
                    },
                }
            })
            .collect()
    }
}

impl Default for CrashRecoveryHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Live `(id, offset)` pairs of `log`, ordered by offset.
///
/// # Errors
///
/// Returns an error if a frame cannot be decoded.
pub fn live_entries<B: StorageBackend>(log: &LogStore<B>) -> CoreResult<Vec<(DocumentId, u64)>> {
    let mut live = HashMap::new();
    for item in log.scan()? {
        let (offset, record) = item?;
        let Some(id) = record.id() else { continue };
        if record.tombstone {
            live.remove(&id);
        } else {
            live.insert(id, offset);
        }
    }
    let mut entries: Vec<_> = live.into_iter().collect();
    entries.sort_by_key(|(_, offset)| *offset);
    Ok(entries)
}

/// A storage backend wrapper that tears writes once a byte budget is
/// spent.
///
/// The write that crosses the budget stores only the bytes that fit and
/// then fails, like a process dying halfway through `write(2)`.
pub struct CrashableBackend<B> {
    inner: B,
    budget: AtomicU64,
    crashed: AtomicBool,
}

impl<B: StorageBackend> CrashableBackend<B> {
    /// Wraps `inner` with an unlimited budget.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            budget: AtomicU64::new(u64::MAX),
            crashed: AtomicBool::new(false),
        }
    }

    /// Allows only `bytes` more bytes to be written.
    pub fn crash_after(&self, bytes: u64) {
        self.budget.store(bytes, Ordering::SeqCst);
    }

    /// Returns whether a write has been torn.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Consumes the wrapper, returning what survived the crash.
    pub fn into_inner(self) -> B {
        self.inner
    }

    /// Splits `len` into the part that may be written and whether the
    /// write crashes.
    fn spend(&self, len: usize) -> StorageResult<(usize, bool)> {
        if self.has_crashed() {
            return Err(crash_error());
        }
        let budget = self.budget.load(Ordering::SeqCst);
        let len_u64 = len as u64;
        if len_u64 <= budget {
            self.budget.store(budget - len_u64, Ordering::SeqCst);
            Ok((len, false))
        } else {
            self.budget.store(0, Ordering::SeqCst);
            self.crashed.store(true, Ordering::SeqCst);
            // budget < len, so it fits in usize.
            Ok((budget as usize, true))
        }
    }
}

fn crash_error() -> StorageError {
    StorageError::Io(io::Error::new(io::ErrorKind::Other, "simulated crash"))
}

impl<B: StorageBackend> StorageBackend for CrashableBackend<B> {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let (allowed, crash) = self.spend(data.len())?;
        if crash {
            if allowed > 0 {
                self.inner.append(&data[..allowed])?;
            }
            return Err(crash_error());
        }
        self.inner.append(data)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        let (allowed, crash) = self.spend(data.len())?;
        if crash {
            if allowed > 0 {
                self.inner.write_at(offset, &data[..allowed])?;
            }
            return Err(crash_error());
        }
        self.inner.write_at(offset, data)
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.has_crashed() {
            return Err(crash_error());
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if self.has_crashed() {
            return Err(crash_error());
        }
        self.inner.truncate(new_size)
    }
}
