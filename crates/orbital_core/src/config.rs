//! Database configuration.

/// Configuration for opening a catalog and its collections.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether log, journal and mirror writes are fsynced before returning.
    pub sync_writes: bool,

    /// Number of index mirror deltas accumulated before the mirror snapshot
    /// is rewritten (0 = rewrite the snapshot on every mutation).
    pub mirror_checkpoint_every: usize,

    /// Whether `insert` generates a UUID string `id` for documents that
    /// lack one instead of rejecting them.
    pub assign_missing_ids: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_writes: true,
            mirror_checkpoint_every: 1024,
            assign_missing_ids: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether writes are fsynced.
    #[must_use]
    pub const fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Sets how many mirror deltas trigger a snapshot rewrite.
    #[must_use]
    pub const fn mirror_checkpoint_every(mut self, deltas: usize) -> Self {
        self.mirror_checkpoint_every = deltas;
        self
    }

    /// Sets whether missing ids are generated on insert.
    #[must_use]
    pub const fn assign_missing_ids(mut self, value: bool) -> Self {
        self.assign_missing_ids = value;
        self
    }
}

/// When a collection is worth compacting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    /// Logs smaller than this many bytes are left alone.
    pub min_log_bytes: u64,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            min_log_bytes: 500 * 1024,
        }
    }
}

impl CompactionPolicy {
    /// Creates a policy with the given size threshold.
    #[must_use]
    pub const fn with_min_log_bytes(min_log_bytes: u64) -> Self {
        Self { min_log_bytes }
    }

    /// Returns `true` if a log of `log_bytes` should be compacted.
    #[must_use]
    pub const fn should_compact(&self, log_bytes: u64) -> bool {
        log_bytes > self.min_log_bytes
    }
}
