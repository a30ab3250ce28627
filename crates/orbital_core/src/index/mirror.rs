//! On-disk mirror of the primary index.
//!
//! The mirror lets a collection skip the full log scan on open. It is an
//! optimization only: the log is the source of truth, and a mirror that is
//! missing, unreadable or implausible is discarded in favour of a rebuild.
//!
//! ## Format
//!
//! - `<name>.db.idx` is the snapshot: a JSON array of `[id, offset]` pairs
//! - `<name>.db.idx.log` holds one JSON object per line for every change
//!   since the snapshot, `{"op":"set","id":..,"offset":..}` or
//!   `{"op":"remove","id":..}`
//!
//! Loading applies the deltas over the snapshot in order. Every delta sets
//! the final state of its id, so replaying deltas that the snapshot already
//! includes yields the same map.

use crate::dir::{remove_if_exists, sync_parent, write_atomic};
use crate::error::CoreResult;
use crate::types::DocumentId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// A mirror that could not be read. Never surfaced to callers.
#[derive(Debug, Error)]
enum MirrorError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed content: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One change to the primary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Delta {
    /// `id` now lives at `offset`.
    Set {
        /// Document id.
        id: DocumentId,
        /// Frame offset.
        offset: u64,
    },
    /// `id` is no longer present.
    Remove {
        /// Document id.
        id: DocumentId,
    },
}

impl Delta {
    fn apply(self, primary: &mut HashMap<DocumentId, u64>) {
        match self {
            Self::Set { id, offset } => {
                primary.insert(id, offset);
            }
            Self::Remove { id } => {
                primary.remove(&id);
            }
        }
    }
}

/// Snapshot plus delta log for one collection's primary index.
#[derive(Debug)]
pub struct IndexMirror {
    snapshot_path: PathBuf,
    delta_path: PathBuf,
    sync_writes: bool,
    checkpoint_every: usize,
    pending_deltas: usize,
}

impl IndexMirror {
    /// Creates a mirror over the given files. Nothing is read or written.
    #[must_use]
    pub fn new(snapshot_path: &Path, delta_path: &Path) -> Self {
        Self {
            snapshot_path: snapshot_path.to_path_buf(),
            delta_path: delta_path.to_path_buf(),
            sync_writes: true,
            checkpoint_every: 1024,
            pending_deltas: 0,
        }
    }

    /// Sets whether mirror writes are fsynced.
    #[must_use]
    pub const fn with_sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Sets how many deltas accumulate before the snapshot is rewritten.
    /// `0` rewrites the snapshot on every change.
    #[must_use]
    pub const fn with_checkpoint_every(mut self, deltas: usize) -> Self {
        self.checkpoint_every = deltas;
        self
    }

    /// Number of deltas written since the last snapshot.
    #[must_use]
    pub const fn pending_deltas(&self) -> usize {
        self.pending_deltas
    }

    /// Loads the mirrored primary index.
    ///
    /// Returns `None` if there is no snapshot or if the snapshot or delta
    /// log cannot be parsed; the latter is logged as a warning.
    pub fn load(&mut self) -> Option<HashMap<DocumentId, u64>> {
        if !self.snapshot_path.exists() {
            return None;
        }
        match self.try_load() {
            Ok((primary, replayed)) => {
                self.pending_deltas = replayed;
                debug!(entries = primary.len(), replayed, "loaded index mirror");
                Some(primary)
            }
            Err(e) => {
                warn!(
                    path = %self.snapshot_path.display(),
                    error = %e,
                    "index mirror unreadable, rebuilding from log"
                );
                None
            }
        }
    }

    fn try_load(&self) -> Result<(HashMap<DocumentId, u64>, usize), MirrorError> {
        let raw = fs::read(&self.snapshot_path)?;
        let entries: Vec<(DocumentId, u64)> = serde_json::from_slice(&raw)?;
        let mut primary: HashMap<DocumentId, u64> = entries.into_iter().collect();

        let file = match fs::File::open(&self.delta_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((primary, 0)),
            Err(e) => return Err(e.into()),
        };

        let mut replayed = 0;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let delta: Delta = serde_json::from_str(&line)?;
            delta.apply(&mut primary);
            replayed += 1;
        }
        Ok((primary, replayed))
    }

    /// Records one change. `primary` must already include it.
    ///
    /// # Errors
    ///
    /// Returns an error if the delta or snapshot cannot be written.
    pub fn record(&mut self, delta: &Delta, primary: &HashMap<DocumentId, u64>) -> CoreResult<()> {
        if self.pending_deltas + 1 > self.checkpoint_every {
            return self.checkpoint(primary);
        }

        let mut line = serde_json::to_vec(delta)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.delta_path)?;
        file.write_all(&line)?;
        if self.sync_writes {
            file.sync_all()?;
        }

        self.pending_deltas += 1;
        Ok(())
    }

    /// Rewrites the snapshot from `primary` and clears the delta log.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub fn checkpoint(&mut self, primary: &HashMap<DocumentId, u64>) -> CoreResult<()> {
        let mut entries: Vec<(&DocumentId, &u64)> = primary.iter().collect();
        entries.sort_by_key(|(_, offset)| **offset);

        let data = serde_json::to_vec(&entries)?;
        write_atomic(&self.snapshot_path, &data, self.sync_writes)?;
        remove_if_exists(&self.delta_path)?;

        self.pending_deltas = 0;
        debug!(entries = entries.len(), "index mirror checkpointed");
        Ok(())
    }

    /// Deletes the mirror so the next open rebuilds from the log.
    ///
    /// With sync writes on, the removal is durable when this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be removed.
    pub fn invalidate(&mut self) -> CoreResult<()> {
        let removed_snapshot = remove_if_exists(&self.snapshot_path)?;
        let removed_deltas = remove_if_exists(&self.delta_path)?;
        if self.sync_writes && (removed_snapshot || removed_deltas) {
            sync_parent(&self.snapshot_path)?;
        }
        self.pending_deltas = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn mirror(dir: &Path) -> IndexMirror {
        IndexMirror::new(&dir.join("c.db.idx"), &dir.join("c.db.idx.log")).with_sync_writes(false)
    }

    fn map(entries: &[(DocumentId, u64)]) -> HashMap<DocumentId, u64> {
        entries.iter().cloned().collect()
    }

    #[test]
    fn missing_snapshot_loads_nothing() {
        let dir = tempdir().unwrap();
        assert!(mirror(dir.path()).load().is_none());
    }

    #[test]
    fn snapshot_uses_pair_list_format() {
        let dir = tempdir().unwrap();
        let mut m = mirror(dir.path());
        let primary = map(&[(DocumentId::Int(1), 0), (DocumentId::from("b"), 21)]);
        m.checkpoint(&primary).unwrap();

        let raw = fs::read_to_string(dir.path().join("c.db.idx")).unwrap();
        assert_eq!(raw, r#"[[1,0],["b",21]]"#);
        assert_eq!(m.load(), Some(primary));
    }

    #[test]
    fn deltas_replay_over_snapshot() {
        let dir = tempdir().unwrap();
        let mut m = mirror(dir.path());
        let mut primary = map(&[(DocumentId::Int(1), 0)]);
        m.checkpoint(&primary).unwrap();

        primary.insert(DocumentId::Int(2), 20);
        m.record(
            &Delta::Set {
                id: DocumentId::Int(2),
                offset: 20,
            },
            &primary,
        )
        .unwrap();
        primary.remove(&DocumentId::Int(1));
        m.record(&Delta::Remove { id: DocumentId::Int(1) }, &primary)
            .unwrap();

        let mut reopened = mirror(dir.path());
        assert_eq!(reopened.load(), Some(primary));
        assert_eq!(reopened.pending_deltas(), 2);
    }

    #[test]
    fn checkpoint_every_zero_writes_snapshot_each_time() {
        let dir = tempdir().unwrap();
        let mut m = mirror(dir.path()).with_checkpoint_every(0);
        let primary = map(&[(DocumentId::Int(1), 0)]);
        m.record(
            &Delta::Set {
                id: DocumentId::Int(1),
                offset: 0,
            },
            &primary,
        )
        .unwrap();

        assert!(dir.path().join("c.db.idx").exists());
        assert!(!dir.path().join("c.db.idx.log").exists());
        assert_eq!(m.pending_deltas(), 0);
    }

    #[test]
    fn threshold_triggers_checkpoint() {
        let dir = tempdir().unwrap();
        let mut m = mirror(dir.path()).with_checkpoint_every(2);
        let mut primary = HashMap::new();
        for i in 0..3u64 {
            let id = DocumentId::Int(i as i64);
            primary.insert(id.clone(), i * 10);
            m.record(&Delta::Set { id, offset: i * 10 }, &primary).unwrap();
        }

        assert_eq!(m.pending_deltas(), 0);
        assert!(!dir.path().join("c.db.idx.log").exists());
        assert_eq!(mirror(dir.path()).load(), Some(primary));
    }

    #[test]
    fn replaying_applied_deltas_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut m = mirror(dir.path());
        let mut primary = HashMap::new();
        m.checkpoint(&primary).unwrap();

        primary.insert(DocumentId::Int(1), 0);
        m.record(&Delta::Set { id: DocumentId::Int(1), offset: 0 }, &primary)
            .unwrap();
        primary.remove(&DocumentId::Int(1));
        m.record(&Delta::Remove { id: DocumentId::Int(1) }, &primary)
            .unwrap();

        // Snapshot rewritten but the delta log left in place.
        let data = serde_json::to_vec(&Vec::<(DocumentId, u64)>::new()).unwrap();
        fs::write(dir.path().join("c.db.idx"), data).unwrap();

        assert_eq!(mirror(dir.path()).load(), Some(primary));
    }

    #[test]
    fn garbage_is_reported_as_missing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("c.db.idx"), b"{not json").unwrap();
        assert!(mirror(dir.path()).load().is_none());

        fs::write(dir.path().join("c.db.idx"), b"[]").unwrap();
        fs::write(dir.path().join("c.db.idx.log"), b"{\"op\":\"set\",\"id\":1").unwrap();
        assert!(mirror(dir.path()).load().is_none());
    }

    #[test]
    fn invalidate_removes_files() {
        let dir = tempdir().unwrap();
        let mut m = mirror(dir.path());
        let primary = map(&[(DocumentId::Int(1), 0)]);
        m.checkpoint(&primary).unwrap();
        m.record(&Delta::Remove { id: DocumentId::Int(1) }, &HashMap::new())
            .unwrap();

        m.invalidate().unwrap();
        assert!(!dir.path().join("c.db.idx").exists());
        assert!(!dir.path().join("c.db.idx.log").exists());
        assert!(m.load().is_none());
    }
}
