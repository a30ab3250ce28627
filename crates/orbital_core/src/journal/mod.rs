//! Single-entry intent journal.
//!
//! Before a mutation touches the log, a description of it is written to
//! `<name>.journal`; once the log and index agree again the file is
//! removed. A journal file found at open therefore names the one mutation
//! that may have been interrupted, and [`recover`] decides what to do
//! about it.
//!
//! ## Protocol
//!
//! ```text
//! begin(intent) ─► mutate log ─► update index ─► commit()
//! ```
//!
//! At most one entry exists at a time. `begin` refuses to overwrite a
//! pending entry: a mutation that failed half-way must be resolved by
//! recovery, not silently forgotten.

mod recovery;

pub use recovery::{recover, RecoveryOutcome};

use crate::dir::{remove_if_exists, sync_parent, write_atomic};
use crate::error::{CoreError, CoreResult};
use crate::types::{Document, DocumentId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A mutation that is about to be applied to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Mutation {
    /// Append `document` as a `frame_len`-byte frame at `offset`.
    Insert {
        /// The document being inserted.
        document: Document,
        /// Log size when the insert began.
        offset: u64,
        /// Length of the encoded frame.
        frame_len: u64,
    },
    /// Tombstone the frame of `id` at `offset`.
    Delete {
        /// The document being deleted.
        id: DocumentId,
        /// Offset of its live frame.
        offset: u64,
    },
    /// Replace the log with a compacted copy.
    Compact,
}

impl Mutation {
    /// Returns the kind of mutation.
    #[must_use]
    pub const fn kind(&self) -> MutationKind {
        match self {
            Self::Insert { .. } => MutationKind::Insert,
            Self::Delete { .. } => MutationKind::Delete,
            Self::Compact => MutationKind::Compact,
        }
    }
}

/// Discriminant of [`Mutation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    /// An insert.
    Insert,
    /// A delete.
    Delete,
    /// A compaction.
    Compact,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Compact => "compact",
        })
    }
}

/// On-disk journal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// The pending mutation.
    pub mutation: Mutation,
}

/// The journal file of one collection.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    collection: String,
    sync_writes: bool,
}

impl Journal {
    /// Creates a handle for the journal at `path`. Nothing is read.
    #[must_use]
    pub fn new(path: &Path, collection: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            collection: collection.into(),
            sync_writes: true,
        }
    }

    /// Sets whether journal writes are fsynced.
    #[must_use]
    pub const fn with_sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if an entry is waiting to be committed or recovered.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.path.exists()
    }

    /// Durably records `mutation` as the pending intent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::JournalBusy`] if an entry is already pending,
    /// or an I/O error if the entry cannot be written.
    pub fn begin(&mut self, mutation: Mutation) -> CoreResult<()> {
        if self.is_pending() {
            return Err(CoreError::JournalBusy {
                collection: self.collection.clone(),
            });
        }

        let data = serde_json::to_vec(&JournalEntry { mutation })?;
        write_atomic(&self.path, &data, self.sync_writes)
    }

    /// Clears the pending entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn commit(&mut self) -> CoreResult<()> {
        if remove_if_exists(&self.path)? && self.sync_writes {
            sync_parent(&self.path)?;
        }
        Ok(())
    }

    /// Reads the pending entry, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn pending(&self) -> CoreResult<Option<JournalEntry>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }
}
