//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level storage backend for OrbitalDB.
///
/// Storage backends are **opaque byte stores**. They provide simple operations
/// for reading, appending, overwriting and truncating bytes. OrbitalDB owns
/// all format interpretation - backends do not understand frames or documents.
///
/// # Invariants
///
/// - `append` returns the offset where data was written and grows the
///   storage by exactly `data.len()` bytes
/// - `write_at` never changes the storage size
/// - `read_at` returns exactly the bytes previously written at that offset
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::OffsetOutOfRange`](crate::StorageError::OffsetOutOfRange)
    /// if the read would extend beyond the current size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Overwrites bytes in place starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::OffsetOutOfRange`](crate::StorageError::OffsetOutOfRange)
    /// if `offset + data.len()` exceeds the current size, or an I/O error.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    ///
    /// This is the offset where the next `append` will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the storage to the given size.
    ///
    /// Used by recovery to cut a torn frame off the end of a log.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is greater than the current size or
    /// the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
