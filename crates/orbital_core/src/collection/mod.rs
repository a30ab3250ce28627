//! Collections: the public document API over one log file.
//!
//! Every mutation follows the same protocol:
//!
//! 1. validate the document and work out its id (no I/O)
//! 2. journal the intent
//! 3. apply it to the log
//! 4. update the index (and its mirror)
//! 5. clear the journal
//!
//! A crash anywhere in between is resolved on the next
//! [`open`](Collection::open) by journal recovery, which runs before the
//! index is built.

mod options;
mod query;

pub use options::CollectionOptions;
pub use query::Query;

use crate::config::Config;
use crate::dir::{validate_collection_name, CollectionPaths};
use crate::error::{CoreError, CoreResult};
use crate::index::{Index, IndexMirror, RebuildSource};
use crate::journal::{recover, Journal, Mutation, RecoveryOutcome};
use crate::log::{CompactionStats, LogStore};
use crate::schema::{json_type_name, ValidationError};
use crate::stats::{CollectionStats, CountersSnapshot, OperationCounters, VerifyReport};
use crate::types::{Document, DocumentId, ID_FIELD};
use orbital_codec::encode;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A named set of documents stored in `<name>.db`.
///
/// Mutations take `&mut self`: a collection has a single writer. Share a
/// collection between threads through [`Catalog`](crate::Catalog), which
/// hands out `Arc<Mutex<Collection>>`.
///
/// Reads always go to disk; only ids and offsets are held in memory.
#[derive(Debug)]
pub struct Collection {
    name: String,
    log: LogStore,
    index: Index,
    journal: Journal,
    options: CollectionOptions,
    config: Config,
    counters: OperationCounters,
    last_recovery: RecoveryOutcome,
}

impl Collection {
    /// Opens collection `name` in directory `dir`, creating its log if
    /// needed.
    ///
    /// Opening resolves any journaled mutation, removes compaction leftovers
    /// and builds the indexes. The caller must ensure no other handle to the
    /// same collection exists; [`Catalog`](crate::Catalog) does this.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, the files cannot be
    /// accessed, or the log holds a corrupt frame.
    pub fn open(
        dir: &Path,
        name: &str,
        options: CollectionOptions,
        config: &Config,
    ) -> CoreResult<Self> {
        validate_collection_name(name)?;
        let paths = CollectionPaths::new(dir, name);

        let mut log = LogStore::open(&paths.log, config.sync_writes)?;
        let mut journal = Journal::new(&paths.journal, name).with_sync_writes(config.sync_writes);

        let mut mirror = IndexMirror::new(&paths.index_snapshot, &paths.index_deltas)
            .with_sync_writes(config.sync_writes)
            .with_checkpoint_every(config.mirror_checkpoint_every);
        let recovery = recover(&mut journal, &mut log, Some(&mut mirror))?;
        log.discard_stale_staging()?;

        let mut index = Index::new(options.indexed_fields(), Some(mirror));
        let source = index.rebuild(&log)?;

        info!(
            collection = name,
            documents = index.len(),
            from_mirror = source == RebuildSource::Mirror,
            "collection opened"
        );

        Ok(Self {
            name: name.to_string(),
            log,
            index,
            journal,
            options,
            config: config.clone(),
            counters: OperationCounters::new(),
            last_recovery: recovery,
        })
    }

    /// Collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the log file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    /// What journal recovery did when this handle was opened.
    #[must_use]
    pub fn last_recovery(&self) -> &RecoveryOutcome {
        &self.last_recovery
    }

    /// Stores `document` and returns its id.
    ///
    /// If a document with the same id exists, it is replaced. With
    /// [`Config::assign_missing_ids`] set, a document without an `id` gets a
    /// random UUID string.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] before anything is written, if the
    ///   document has no usable id or the validator rejects it
    /// - [`CoreError::JournalBusy`] if an earlier mutation failed half-way
    /// - I/O errors
    pub fn insert(&mut self, document: Document) -> CoreResult<DocumentId> {
        let (id, document) = self.prepare(document)?;
        let frame = encode(&document, false)?;
        let frame_len = frame.len() as u64;
        let offset = self.log.size()?;

        self.journal.begin(Mutation::Insert {
            document: document.clone(),
            offset,
            frame_len,
        })?;

        let written = self.log.append(&frame)?;
        if written != offset {
            return Err(CoreError::invalid_operation(format!(
                "log grew from {offset} to {written} bytes during insert"
            )));
        }
        self.index.set(id.clone(), written, &document)?;
        self.journal.commit()?;

        self.counters.record_insert(frame_len);
        debug!(collection = %self.name, %id, offset, "inserted document");
        Ok(id)
    }

    /// Stores a JSON value, which must be an object.
    ///
    /// # Errors
    ///
    /// See [`insert`](Self::insert).
    pub fn insert_value(&mut self, value: Value) -> CoreResult<DocumentId> {
        match value {
            Value::Object(document) => self.insert(document),
            _ => Err(ValidationError::NotAnObject.into()),
        }
    }

    fn prepare(&self, mut document: Document) -> CoreResult<(DocumentId, Document)> {
        let missing = matches!(document.get(ID_FIELD), None | Some(Value::Null));
        if missing && self.config.assign_missing_ids {
            document.insert(
                ID_FIELD.to_string(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }

        let id = match document.get(ID_FIELD) {
            None | Some(Value::Null) => return Err(ValidationError::MissingId.into()),
            Some(value) => DocumentId::from_value(value).ok_or(ValidationError::InvalidId {
                found: json_type_name(value),
            })?,
        };

        if let Some(validator) = self.options.validator() {
            validator.validate(&document)?;
        }
        Ok((id, document))
    }

    /// Deletes the document with `id`. Returns `false` if there was none.
    ///
    /// The frame is flagged deleted in place; its bytes are reclaimed by
    /// [`compact`](Self::compact).
    ///
    /// # Errors
    ///
    /// - [`CoreError::IndexDesync`] if the indexed frame does not hold the
    ///   live document
    /// - [`CoreError::JournalBusy`] if an earlier mutation failed half-way
    /// - I/O errors
    pub fn delete(&mut self, id: &DocumentId) -> CoreResult<bool> {
        let Some(offset) = self.index.get(id) else {
            return Ok(false);
        };
        self.read_live(id, offset)?;

        self.journal.begin(Mutation::Delete {
            id: id.clone(),
            offset,
        })?;
        self.log.tombstone(offset)?;
        self.index.remove(id)?;
        self.journal.commit()?;

        self.counters.record_delete();
        debug!(collection = %self.name, %id, offset, "deleted document");
        Ok(true)
    }

    /// Returns the document with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexDesync`] or a corruption error if the
    /// indexed frame cannot be read back as the live document.
    pub fn get(&self, id: &DocumentId) -> CoreResult<Option<Document>> {
        let Some(offset) = self.index.get(id) else {
            self.counters.record_read(false);
            return Ok(None);
        };
        let document = self.read_live(id, offset)?;
        self.counters.record_read(true);
        Ok(Some(document))
    }

    /// Returns the first document matching `query`.
    ///
    /// Field queries only match indexed fields; for other fields the result
    /// is always `None`. When several documents share the value, the one
    /// with the smallest id is returned.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn find_one(&self, query: &Query) -> CoreResult<Option<Document>> {
        match query {
            Query::Id(id) => self.get(id),
            Query::Field { name, value } if name == ID_FIELD => match DocumentId::from_value(value) {
                Some(id) => self.get(&id),
                None => Ok(None),
            },
            Query::Field { name, value } => match self.index.lookup_field(name, value) {
                Some(id) => self.get(&id),
                None => {
                    self.counters.record_read(false);
                    Ok(None)
                }
            },
        }
    }

    /// Parses `query` with [`Query::from_value`] and runs it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidQuery`] for malformed queries, otherwise
    /// see [`get`](Self::get).
    pub fn find_one_value(&self, query: &Value) -> CoreResult<Option<Document>> {
        self.find_one(&Query::from_value(query)?)
    }

    fn read_live(&self, id: &DocumentId, offset: u64) -> CoreResult<Document> {
        let record = self.log.read_at(offset)?;
        if record.tombstone {
            return Err(CoreError::index_desync(id.clone(), offset, "frame is a tombstone"));
        }
        if record.id().as_ref() != Some(id) {
            return Err(CoreError::index_desync(
                id.clone(),
                offset,
                "frame holds a different document",
            ));
        }
        Ok(record.document)
    }

    /// Rewrites the log so it holds only live documents.
    ///
    /// Documents keep their relative order. Afterwards every lookup returns
    /// what it returned before.
    ///
    /// # Errors
    ///
    /// Returns an error if the rewrite fails. The index is then rebuilt
    /// from the log on disk, which is either the original or the
    /// compacted one.
    pub fn compact(&mut self) -> CoreResult<CompactionStats> {
        let bytes_before = self.log.size()?;
        let live = self.index.entries_by_offset();

        self.journal.begin(Mutation::Compact)?;
        let offsets = match self.log.compact(&live) {
            Ok(offsets) => offsets,
            Err(e) => {
                self.resync_after_failed_compaction();
                return Err(e);
            }
        };
        self.index.replace_primary(offsets)?;
        self.journal.commit()?;

        let stats = CompactionStats {
            live_records: live.len(),
            bytes_before,
            bytes_after: self.log.size()?,
        };
        self.counters.record_compaction(stats.bytes_after);
        info!(
            collection = %self.name,
            live = stats.live_records,
            reclaimed = stats.bytes_reclaimed(),
            "compaction finished"
        );
        Ok(stats)
    }

    /// Re-derives the index from whatever log is on disk after a compaction
    /// error. The swap may already have happened, so the old offsets cannot
    /// be trusted. The journal entry stays pending if this fails, leaving
    /// the next open to recover.
    fn resync_after_failed_compaction(&mut self) {
        let resynced = self
            .index
            .invalidate_mirror()
            .and_then(|()| self.index.rebuild_from_log(&self.log))
            .and_then(|()| self.journal.commit());
        if let Err(e) = resynced {
            warn!(collection = %self.name, error = %e, "index resync after failed compaction failed");
        }
    }

    /// Returns `true` if the log exceeds the compaction threshold.
    ///
    /// # Errors
    ///
    /// Returns an error if the log size cannot be read.
    pub fn needs_compaction(&self) -> CoreResult<bool> {
        Ok(self
            .options
            .compaction_policy()
            .should_compact(self.log.size()?))
    }

    /// Compacts if [`needs_compaction`](Self::needs_compaction) says so.
    ///
    /// # Errors
    ///
    /// See [`compact`](Self::compact).
    pub fn compact_if_needed(&mut self) -> CoreResult<Option<CompactionStats>> {
        if self.needs_compaction()? {
            self.compact().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Number of live documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if the collection holds no live documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns `true` if a document with `id` exists.
    #[must_use]
    pub fn contains(&self, id: &DocumentId) -> bool {
        self.index.contains(id)
    }

    /// Live ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<DocumentId> {
        self.index.ids()
    }

    /// Size of the log file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be read.
    pub fn log_size(&self) -> CoreResult<u64> {
        self.log.size()
    }

    /// Snapshot of count, ids and log size.
    ///
    /// # Errors
    ///
    /// Returns an error if the log size cannot be read.
    pub fn stats(&self) -> CoreResult<CollectionStats> {
        Ok(CollectionStats {
            name: self.name.clone(),
            count: self.len(),
            ids: self.ids(),
            log_bytes: self.log.size()?,
        })
    }

    /// Operation counters since this handle was opened.
    #[must_use]
    pub fn counters(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }

    /// Scans the whole log and checks it against the index.
    ///
    /// Problems are collected in the report rather than returned as errors.
    ///
    /// # Errors
    ///
    /// Returns an error only if the log cannot be opened for scanning.
    pub fn verify(&self) -> CoreResult<VerifyReport> {
        let mut report = VerifyReport {
            name: self.name.clone(),
            log_bytes: self.log.size()?,
            indexed: self.index.len(),
            ..VerifyReport::default()
        };

        let mut expected: HashMap<DocumentId, u64> = HashMap::new();
        let mut live_offsets: Vec<u64> = Vec::new();

        for item in self.log.scan()? {
            let (offset, record) = match item {
                Ok(item) => item,
                Err(e) => {
                    report.issues.push(e.to_string());
                    break;
                }
            };
            report.frames += 1;

            let Some(id) = record.id() else {
                report
                    .issues
                    .push(format!("frame at offset {offset} has no usable id"));
                continue;
            };
            if record.tombstone {
                report.tombstones += 1;
                expected.remove(&id);
            } else {
                report.live_frames += 1;
                live_offsets.push(offset);
                expected.insert(id, offset);
            }
        }

        let reachable: HashSet<u64> = expected.values().copied().collect();
        report.superseded = live_offsets
            .iter()
            .filter(|offset| !reachable.contains(offset))
            .count();

        for (id, offset) in self.index.entries_by_offset() {
            match expected.get(&id) {
                Some(&found) if found == offset => {}
                Some(&found) => report.issues.push(format!(
                    "index maps {id} to offset {offset}, log has it at {found}"
                )),
                None => report
                    .issues
                    .push(format!("index maps {id} to offset {offset}, log has no live copy")),
            }
        }
        let mut unindexed: Vec<&DocumentId> = expected
            .keys()
            .filter(|id| !self.index.contains(id))
            .collect();
        unindexed.sort();
        for id in unindexed {
            report
                .issues
                .push(format!("log holds live document {id} missing from index"));
        }

        Ok(report)
    }
}
