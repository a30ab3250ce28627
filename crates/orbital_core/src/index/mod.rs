//! In-memory indexes over a collection's log.
//!
//! - The **primary** index maps each live id to the offset of its frame.
//! - **Secondary** indexes map a field's value to the ids holding it.
//!
//! Both are derived state. The primary index is mirrored to disk (see
//! [`IndexMirror`]) so opens can skip the log scan; secondary indexes are
//! rebuilt on every open.

mod mirror;
mod secondary;

pub use mirror::{Delta, IndexMirror};
pub use secondary::{FieldKey, SecondaryIndex};

use crate::error::{CoreError, CoreResult};
use crate::log::LogStore;
use crate::types::{Document, DocumentId};
use orbital_storage::StorageBackend;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// Where a rebuilt index came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildSource {
    /// Loaded from the on-disk mirror.
    Mirror,
    /// Reconstructed by scanning the log.
    LogScan,
}

/// Primary and secondary indexes of one collection.
#[derive(Debug)]
pub struct Index {
    primary: HashMap<DocumentId, u64>,
    secondary: BTreeMap<String, SecondaryIndex>,
    mirror: Option<IndexMirror>,
}

impl Index {
    /// Creates an empty index with secondary indexes on `fields`.
    ///
    /// Without a mirror nothing is persisted.
    #[must_use]
    pub fn new<S: AsRef<str>>(fields: &[S], mirror: Option<IndexMirror>) -> Self {
        let secondary = fields
            .iter()
            .map(|f| (f.as_ref().to_string(), SecondaryIndex::new(f.as_ref())))
            .collect();
        Self {
            primary: HashMap::new(),
            secondary,
            mirror,
        }
    }

    /// Populates the index for `log`.
    ///
    /// Uses the mirror when it is present, parseable and consistent with the
    /// log; otherwise scans the log. The result is written back as a fresh
    /// mirror snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the log holds a corrupt frame or the snapshot
    /// cannot be written.
    pub fn rebuild<B: StorageBackend>(&mut self, log: &LogStore<B>) -> CoreResult<RebuildSource> {
        let loaded = self.mirror.as_mut().and_then(IndexMirror::load);

        if let Some(primary) = loaded {
            match self.adopt_mirrored(log, primary) {
                Ok(()) => {
                    self.checkpoint()?;
                    return Ok(RebuildSource::Mirror);
                }
                Err(e) => {
                    warn!(error = %e, "index mirror disagrees with log, rebuilding");
                }
            }
        }

        self.rebuild_from_log(log)?;
        Ok(RebuildSource::LogScan)
    }

    /// Discards the current state and scans the log from the start.
    ///
    /// A live frame sets its id's offset and a tombstone removes the id, so
    /// the last frame for each id wins.
    ///
    /// # Errors
    ///
    /// Returns an error on the first unreadable frame or if the snapshot
    /// cannot be written.
    pub fn rebuild_from_log<B: StorageBackend>(&mut self, log: &LogStore<B>) -> CoreResult<()> {
        self.clear();

        for item in log.scan()? {
            let (offset, record) = item?;
            let id = record.id().ok_or_else(|| {
                CoreError::corrupt_record(offset, "stored document has no usable id")
            })?;

            if record.tombstone {
                self.remove_entry(&id);
            } else {
                self.insert_entry(id, offset, &record.document);
            }
        }

        info!(entries = self.primary.len(), "index rebuilt from log");
        self.checkpoint()
    }

    fn adopt_mirrored<B: StorageBackend>(
        &mut self,
        log: &LogStore<B>,
        primary: HashMap<DocumentId, u64>,
    ) -> CoreResult<()> {
        self.clear();
        let size = log.size()?;

        for (id, offset) in &primary {
            if *offset >= size {
                return Err(CoreError::OffsetOutOfRange {
                    offset: *offset,
                    len: 0,
                    size,
                });
            }
            if self.secondary.is_empty() {
                continue;
            }

            let record = log.read_at(*offset)?;
            if record.tombstone || record.id().as_ref() != Some(id) {
                return Err(CoreError::index_desync(
                    id.clone(),
                    *offset,
                    "mirrored offset does not hold the live document",
                ));
            }
            for index in self.secondary.values_mut() {
                index.insert(id, &record.document);
            }
        }

        self.primary = primary;
        Ok(())
    }

    /// Records that `id` now lives at `offset` with contents `document`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mirror cannot be updated.
    pub fn set(&mut self, id: DocumentId, offset: u64, document: &Document) -> CoreResult<()> {
        self.insert_entry(id.clone(), offset, document);
        self.persist(&Delta::Set { id, offset })
    }

    /// Forgets `id`. Returns its previous offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the mirror cannot be updated.
    pub fn remove(&mut self, id: &DocumentId) -> CoreResult<Option<u64>> {
        let previous = self.remove_entry(id);
        if previous.is_some() {
            self.persist(&Delta::Remove { id: id.clone() })?;
        }
        Ok(previous)
    }

    /// Swaps in a new primary mapping after compaction.
    ///
    /// Secondary indexes are untouched: compaction moves documents but does
    /// not change them.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub fn replace_primary(&mut self, primary: HashMap<DocumentId, u64>) -> CoreResult<()> {
        self.primary = primary;
        self.checkpoint()
    }

    /// Returns the offset of `id`.
    #[must_use]
    pub fn get(&self, id: &DocumentId) -> Option<u64> {
        self.primary.get(id).copied()
    }

    /// Returns `true` if `id` is live.
    #[must_use]
    pub fn contains(&self, id: &DocumentId) -> bool {
        self.primary.contains_key(id)
    }

    /// Returns the smallest id whose `field` equals `value`.
    ///
    /// A field without a secondary index never matches.
    #[must_use]
    pub fn lookup_field(&self, field: &str, value: &Value) -> Option<DocumentId> {
        self.secondary.get(field)?.lookup(value).cloned()
    }

    /// Returns `true` if `field` has a secondary index.
    #[must_use]
    pub fn is_indexed(&self, field: &str) -> bool {
        self.secondary.contains_key(field)
    }

    /// Names of the fields with secondary indexes.
    #[must_use]
    pub fn indexed_fields(&self) -> Vec<&str> {
        self.secondary.keys().map(String::as_str).collect()
    }

    /// Number of live documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.primary.len()
    }

    /// Returns `true` if there are no live documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// Live ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<DocumentId> = self.primary.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Live `(id, offset)` pairs in ascending offset order.
    #[must_use]
    pub fn entries_by_offset(&self) -> Vec<(DocumentId, u64)> {
        let mut entries: Vec<(DocumentId, u64)> = self
            .primary
            .iter()
            .map(|(id, offset)| (id.clone(), *offset))
            .collect();
        entries.sort_by_key(|(_, offset)| *offset);
        entries
    }

    /// Deletes the on-disk mirror.
    ///
    /// # Errors
    ///
    /// Returns an error if the mirror files cannot be removed.
    pub fn invalidate_mirror(&mut self) -> CoreResult<()> {
        match self.mirror.as_mut() {
            Some(mirror) => mirror.invalidate(),
            None => Ok(()),
        }
    }

    fn insert_entry(&mut self, id: DocumentId, offset: u64, document: &Document) {
        for index in self.secondary.values_mut() {
            index.insert(&id, document);
        }
        self.primary.insert(id, offset);
    }

    fn remove_entry(&mut self, id: &DocumentId) -> Option<u64> {
        for index in self.secondary.values_mut() {
            index.remove(id);
        }
        self.primary.remove(id)
    }

    fn clear(&mut self) {
        self.primary.clear();
        for index in self.secondary.values_mut() {
            index.clear();
        }
    }

    fn persist(&mut self, delta: &Delta) -> CoreResult<()> {
        match self.mirror.as_mut() {
            Some(mirror) => mirror.record(delta, &self.primary),
            None => Ok(()),
        }
    }

    fn checkpoint(&mut self) -> CoreResult<()> {
        match self.mirror.as_mut() {
            Some(mirror) => mirror.checkpoint(&self.primary),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbital_codec::encode;
    use orbital_storage::InMemoryBackend;
    use proptest::prelude::*;
    use serde_json::json;
    use tempfile::tempdir;

    const NO_FIELDS: &[&str] = &[];

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn append(log: &mut LogStore<InMemoryBackend>, value: Value) -> u64 {
        log.append(&encode(&value, false).unwrap()).unwrap()
    }

    #[test]
    fn set_get_remove() {
        let mut index = Index::new(NO_FIELDS, None);
        index
            .set(DocumentId::Int(1), 0, &doc(json!({ "id": 1 })))
            .unwrap();

        assert_eq!(index.get(&DocumentId::Int(1)), Some(0));
        assert_eq!(index.remove(&DocumentId::Int(1)).unwrap(), Some(0));
        assert_eq!(index.remove(&DocumentId::Int(1)).unwrap(), None);
        assert!(index.is_empty());
    }

    #[test]
    fn rebuild_applies_tombstones_in_order() {
        let mut log = LogStore::new(InMemoryBackend::new());
        let a = append(&mut log, json!({ "id": 1, "val": "a" }));
        let b = append(&mut log, json!({ "id": 2, "val": "b" }));
        log.tombstone(a).unwrap();
        let a2 = append(&mut log, json!({ "id": 1, "val": "a2" }));
        let c = append(&mut log, json!({ "id": 3, "val": "c" }));
        log.tombstone(c).unwrap();

        let mut index = Index::new(&["val"], None);
        index.rebuild_from_log(&log).unwrap();

        assert_eq!(index.entries_by_offset(), vec![
            (DocumentId::Int(2), b),
            (DocumentId::Int(1), a2),
        ]);
        assert_eq!(index.lookup_field("val", &json!("a2")), Some(DocumentId::Int(1)));
        assert_eq!(index.lookup_field("val", &json!("a")), None);
        assert_eq!(index.lookup_field("val", &json!("c")), None);
    }

    #[test]
    fn superseded_frame_is_replaced_by_later_one() {
        let mut log = LogStore::new(InMemoryBackend::new());
        append(&mut log, json!({ "id": 1, "val": "old" }));
        let newer = append(&mut log, json!({ "id": 1, "val": "new" }));

        let mut index = Index::new(&["val"], None);
        index.rebuild_from_log(&log).unwrap();

        assert_eq!(index.get(&DocumentId::Int(1)), Some(newer));
        assert_eq!(index.lookup_field("val", &json!("old")), None);
    }

    #[test]
    fn unindexed_field_never_matches() {
        let mut index = Index::new(&["email"], None);
        index
            .set(DocumentId::Int(1), 0, &doc(json!({ "id": 1, "name": "n" })))
            .unwrap();
        assert!(index.is_indexed("email"));
        assert!(!index.is_indexed("name"));
        assert_eq!(index.lookup_field("name", &json!("n")), None);
    }

    #[test]
    fn rebuild_prefers_mirror() {
        let dir = tempdir().unwrap();
        let mirror = || {
            IndexMirror::new(&dir.path().join("c.db.idx"), &dir.path().join("c.db.idx.log"))
                .with_sync_writes(false)
        };
        let mut log = LogStore::new(InMemoryBackend::new());
        let a = append(&mut log, json!({ "id": 1, "val": "a" }));

        let mut first = Index::new(&["val"], Some(mirror()));
        assert_eq!(first.rebuild(&log).unwrap(), RebuildSource::LogScan);

        let mut second = Index::new(&["val"], Some(mirror()));
        assert_eq!(second.rebuild(&log).unwrap(), RebuildSource::Mirror);
        assert_eq!(second.get(&DocumentId::Int(1)), Some(a));
        assert_eq!(second.lookup_field("val", &json!("a")), Some(DocumentId::Int(1)));
    }

    #[test]
    fn implausible_mirror_falls_back_to_scan() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("c.db.idx"), b"[[1,9999]]").unwrap();
        let mirror =
            IndexMirror::new(&dir.path().join("c.db.idx"), &dir.path().join("c.db.idx.log"))
                .with_sync_writes(false);

        let mut log = LogStore::new(InMemoryBackend::new());
        append(&mut log, json!({ "id": 2 }));

        let mut index = Index::new(NO_FIELDS, Some(mirror));
        assert_eq!(index.rebuild(&log).unwrap(), RebuildSource::LogScan);
        assert_eq!(index.ids(), vec![DocumentId::Int(2)]);
    }

    #[test]
    fn frame_without_id_is_corrupt() {
        let mut log = LogStore::new(InMemoryBackend::new());
        append(&mut log, json!({ "name": "no id" }));

        let mut index = Index::new(NO_FIELDS, None);
        assert!(matches!(
            index.rebuild_from_log(&log).unwrap_err(),
            CoreError::CorruptRecord { offset: 0, .. }
        ));
    }

    proptest! {
        /// Rebuilding twice from the same log yields the same mapping, and
        /// every mapped offset holds a live frame with that id.
        #[test]
        fn rebuild_is_idempotent_and_consistent(
            ops in prop::collection::vec((0i64..8, any::<bool>()), 1..40)
        ) {
            let mut log = LogStore::new(InMemoryBackend::new());
            let mut live: HashMap<DocumentId, u64> = HashMap::new();
            for (n, delete) in ops {
                let id = DocumentId::Int(n);
                if delete {
                    if let Some(offset) = live.remove(&id) {
                        log.tombstone(offset).unwrap();
                    }
                } else {
                    let offset = append(&mut log, json!({ "id": n }));
                    live.insert(id, offset);
                }
            }

            let mut first = Index::new(NO_FIELDS, None);
            first.rebuild_from_log(&log).unwrap();
            let mut second = Index::new(NO_FIELDS, None);
            second.rebuild_from_log(&log).unwrap();

            prop_assert_eq!(first.entries_by_offset(), second.entries_by_offset());
            prop_assert_eq!(first.primary.clone(), live);
            for (id, offset) in first.entries_by_offset() {
                let record = log.read_at(offset).unwrap();
                prop_assert!(!record.tombstone);
                prop_assert_eq!(record.id(), Some(id));
            }
        }
    }
}
