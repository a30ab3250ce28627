//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::replace::StagedReplace;
use parking_lot::RwLock;

/// An in-memory storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests of the log store and index rebuild
/// - Ephemeral collections that don't need persistence
///
/// # Example
///
/// ```rust
/// use orbital_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"test data").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing data.
    ///
    /// Useful for testing recovery and corruption scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::OffsetOutOfRange { offset, len, size });
        }

        Ok(data[offset as usize..end as usize].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn write_at(&mut self, offset: u64, new_data: &[u8]) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        let end = offset.saturating_add(new_data.len() as u64);

        if end > size {
            return Err(StorageError::OffsetOutOfRange {
                offset,
                len: new_data.len(),
                size,
            });
        }

        data[offset as usize..end as usize].copy_from_slice(new_data);
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;

        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }

        data.truncate(new_size as usize);
        Ok(())
    }
}

impl StagedReplace for InMemoryBackend {
    fn stage(&self) -> StorageResult<Self> {
        Ok(Self::new())
    }

    fn install(&mut self, staged: Self) -> StorageResult<()> {
        *self.data.write() = staged.data.into_inner();
        Ok(())
    }

    fn discard_staging(&self) -> StorageResult<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn memory_append_and_read() {
        let mut backend = InMemoryBackend::new();

        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(&backend.read_at(0, 11).unwrap(), b"hello world");
    }

    #[test]
    fn memory_read_past_end_fails() {
        let backend = InMemoryBackend::with_data(b"hello".to_vec());
        let result = backend.read_at(10, 5);
        assert!(matches!(result, Err(StorageError::OffsetOutOfRange { .. })));
    }

    #[test]
    fn memory_write_at() {
        let mut backend = InMemoryBackend::with_data(b"abcdef".to_vec());
        backend.write_at(2, b"XY").unwrap();
        assert_eq!(backend.data(), b"abXYef");

        assert!(backend.write_at(5, b"XY").unwrap_err().is_out_of_range());
        assert_eq!(backend.data(), b"abXYef");
    }

    #[test]
    fn memory_truncate() {
        let mut backend = InMemoryBackend::with_data(b"abcdef".to_vec());
        backend.truncate(3).unwrap();
        assert_eq!(backend.data(), b"abc");
        assert!(backend.truncate(4).is_err());
    }

    #[test]
    fn memory_staged_replace() {
        let mut backend = InMemoryBackend::with_data(b"old".to_vec());
        let mut staged = backend.stage().unwrap();
        staged.append(b"fresh").unwrap();
        assert_eq!(backend.data(), b"old");

        backend.install(staged).unwrap();
        assert_eq!(backend.data(), b"fresh");
        assert!(!backend.discard_staging().unwrap());
    }

    proptest! {
        #[test]
        fn appends_are_contiguous(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16)) {
            let mut backend = InMemoryBackend::new();
            let mut expected = 0u64;
            for chunk in &chunks {
                let offset = backend.append(chunk).unwrap();
                prop_assert_eq!(offset, expected);
                expected += chunk.len() as u64;
                prop_assert_eq!(&backend.read_at(offset, chunk.len()).unwrap(), chunk);
            }
            prop_assert_eq!(backend.size().unwrap(), expected);
        }
    }
}
