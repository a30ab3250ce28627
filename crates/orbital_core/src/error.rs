//! Error types for OrbitalDB core.

use crate::schema::ValidationError;
use crate::types::DocumentId;
use orbital_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in OrbitalDB core operations.
///
/// Not-found conditions are not errors: lookups return `Option` and deleting
/// a missing id returns `Ok(false)`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The document was rejected before anything was written.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Frame codec error raised while encoding.
    #[error("codec error: {0}")]
    Codec(#[from] orbital_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Journal or index mirror (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A frame in the log could not be decoded.
    #[error("corrupt record at offset {offset}: {message}")]
    CorruptRecord {
        /// Offset of the frame.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A read or overwrite targeted bytes beyond the end of the log.
    #[error("offset out of range: offset {offset}, len {len}, log size {size}")]
    OffsetOutOfRange {
        /// The requested offset.
        offset: u64,
        /// The requested length.
        len: usize,
        /// The log size at the time of the request.
        size: u64,
    },

    /// The index points at a frame that does not hold the expected live
    /// document.
    #[error("index out of sync with log for id {id} at offset {offset}: {message}")]
    IndexDesync {
        /// The indexed id.
        id: DocumentId,
        /// The indexed offset.
        offset: u64,
        /// What was found instead.
        message: String,
    },

    /// The query is not a scalar id or a single-field object.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Why the query was rejected.
        message: String,
    },

    /// A mutation is already journaled and has not been committed.
    ///
    /// The collection must be reopened so recovery can resolve it.
    #[error("a journaled mutation is still pending in {collection}")]
    JournalBusy {
        /// Name of the collection.
        collection: String,
    },

    /// Collection name is not usable as a file name.
    #[error("invalid collection name: {name:?}")]
    InvalidCollectionName {
        /// The rejected name.
        name: String,
    },

    /// Database directory is already locked by another handle.
    #[error("database locked: another handle has exclusive access")]
    DatabaseLocked,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a corrupt record error.
    pub fn corrupt_record(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            offset,
            message: message.into(),
        }
    }

    /// Creates an index desync error.
    pub fn index_desync(id: DocumentId, offset: u64, message: impl Into<String>) -> Self {
        Self::IndexDesync {
            id,
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns `true` if the document was rejected by validation.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns `true` if the error indicates log corruption or index/log
    /// disagreement.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::CorruptRecord { .. } | Self::OffsetOutOfRange { .. } | Self::IndexDesync { .. }
        )
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::OffsetOutOfRange { offset, len, size } => {
                Self::OffsetOutOfRange { offset, len, size }
            }
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_range_errors_are_lifted() {
        let err: CoreError = StorageError::OffsetOutOfRange {
            offset: 10,
            len: 5,
            size: 12,
        }
        .into();
        assert!(matches!(
            err,
            CoreError::OffsetOutOfRange { offset: 10, len: 5, size: 12 }
        ));
        assert!(err.is_corruption());
    }

    #[test]
    fn validation_is_distinguishable() {
        let err: CoreError = ValidationError::MissingId.into();
        assert!(err.is_validation());
        assert!(!err.is_corruption());
    }
}
