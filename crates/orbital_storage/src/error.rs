//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read or overwrite touched bytes beyond the end of storage.
    #[error("offset out of range: offset {offset}, len {len}, size {size}")]
    OffsetOutOfRange {
        /// The requested offset.
        offset: u64,
        /// The requested length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// A truncation asked to grow the storage.
    #[error("cannot truncate to {requested} bytes, storage holds only {size}")]
    TruncateBeyondEnd {
        /// The requested new size.
        requested: u64,
        /// The current storage size.
        size: u64,
    },
}

impl StorageError {
    /// Returns `true` if this error reports an out-of-range access.
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::OffsetOutOfRange { .. })
    }
}
