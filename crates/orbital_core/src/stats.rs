//! Collection statistics and consistency reports.
//!
//! [`OperationCounters`] are bumped by every collection call and can be
//! read while the collection is in use. [`CollectionStats`] and
//! [`VerifyReport`] are plain serializable snapshots used by the CLI.

use crate::types::DocumentId;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for one collection handle.
///
/// Counters start at zero on open and only increase.
#[derive(Debug, Default)]
pub struct OperationCounters {
    inserts: AtomicU64,
    deletes: AtomicU64,
    reads: AtomicU64,
    misses: AtomicU64,
    compactions: AtomicU64,
    bytes_written: AtomicU64,
}

impl OperationCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_insert(&self, bytes: u64) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self, hit: bool) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if !hit {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_compaction(&self, bytes: u64) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`OperationCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CountersSnapshot {
    /// Successful inserts.
    pub inserts: u64,
    /// Deletes that removed a document.
    pub deletes: u64,
    /// Lookups performed.
    pub reads: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Completed compactions.
    pub compactions: u64,
    /// Bytes appended to the log or written by compaction.
    pub bytes_written: u64,
}

/// Summary of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    /// Collection name.
    pub name: String,
    /// Number of live documents.
    pub count: usize,
    /// Live ids in ascending order.
    pub ids: Vec<DocumentId>,
    /// Size of the log file in bytes.
    pub log_bytes: u64,
}

/// Result of a full log/index consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct VerifyReport {
    /// Collection name.
    pub name: String,
    /// Frames read from the log.
    pub frames: usize,
    /// Frames flagged live.
    pub live_frames: usize,
    /// Frames flagged deleted.
    pub tombstones: usize,
    /// Live-flagged frames no longer referenced by the index.
    pub superseded: usize,
    /// Entries in the primary index.
    pub indexed: usize,
    /// Size of the log file in bytes.
    pub log_bytes: u64,
    /// Every inconsistency found, in log order.
    pub issues: Vec<String>,
}

impl VerifyReport {
    /// Returns `true` if no issue was found.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}
