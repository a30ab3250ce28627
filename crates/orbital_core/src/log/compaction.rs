//! Compaction statistics.

use serde::Serialize;

/// Outcome of a compaction run.
///
/// Compaction keeps exactly the documents reachable through the primary
/// index, in ascending order of their old offsets, and drops everything
/// else: tombstones and superseded versions of re-inserted ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CompactionStats {
    /// Number of live documents copied into the new log.
    pub live_records: usize,
    /// Log size before compaction.
    pub bytes_before: u64,
    /// Log size after compaction.
    pub bytes_after: u64,
}

impl CompactionStats {
    /// Bytes freed by the run.
    #[must_use]
    pub const fn bytes_reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reclaimed_bytes() {
        let stats = CompactionStats {
            live_records: 2,
            bytes_before: 120,
            bytes_after: 50,
        };
        assert_eq!(stats.bytes_reclaimed(), 70);
        assert_eq!(CompactionStats::default().bytes_reclaimed(), 0);
    }
}
