//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::replace::StagedReplace;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Suffix appended to the backing path while a replacement is staged.
const STAGING_SUFFIX: &str = ".tmp";

/// A file-based storage backend.
///
/// The backend only remembers a path. Every operation opens its own handle,
/// performs a single seek/read or seek/write, and drops the handle before
/// returning (including on error paths), so reads always observe the bytes
/// currently on disk.
///
/// # Durability
///
/// - With `sync_writes` enabled, `append`, `write_at` and `truncate` call
///   `File::sync_all()` before releasing the handle
/// - `sync()` can be called explicitly otherwise
///
/// # Example
///
/// ```no_run
/// use orbital_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("users.db")).unwrap();
/// let offset = backend.append(b"persistent data").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    sync_writes: bool,
}

impl FileBackend {
    /// Opens or creates a file backend at the given path.
    ///
    /// A missing file is created empty. Existing contents are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            sync_writes: false,
        })
    }

    /// Sets whether every write is followed by `sync_all`.
    #[must_use]
    pub const fn with_sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path used for a staged replacement of this file.
    #[must_use]
    pub fn staging_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(STAGING_SUFFIX);
        PathBuf::from(name)
    }

    fn open_for_write(&self) -> StorageResult<File> {
        Ok(OpenOptions::new().write(true).open(&self.path)?)
    }

    fn finish_write(&self, file: &File) -> StorageResult<()> {
        if self.sync_writes {
            file.sync_all()?;
        }
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        let size = file.metadata()?.len();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::OffsetOutOfRange { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        let offset = file.metadata()?.len();

        if data.is_empty() {
            return Ok(offset);
        }

        file.write_all(data)?;
        self.finish_write(&file)?;

        Ok(offset)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        let mut file = self.open_for_write()?;
        let size = file.metadata()?.len();

        if offset.saturating_add(data.len() as u64) > size {
            return Err(StorageError::OffsetOutOfRange {
                offset,
                len: data.len(),
                size,
            });
        }

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        self.finish_write(&file)
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    fn sync(&mut self) -> StorageResult<()> {
        let file = self.open_for_write()?;
        file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let file = self.open_for_write()?;
        let size = file.metadata()?.len();

        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }

        file.set_len(new_size)?;
        file.sync_all()?;
        Ok(())
    }
}

impl StagedReplace for FileBackend {
    fn stage(&self) -> StorageResult<Self> {
        let staging = self.staging_path();
        File::create(&staging)?;
        Ok(Self {
            path: staging,
            sync_writes: false,
        })
    }

    fn install(&mut self, mut staged: Self) -> StorageResult<()> {
        staged.sync()?;
        fs::rename(&staged.path, &self.path)?;
        sync_parent_dir(&self.path)
    }

    fn discard_staging(&self) -> StorageResult<bool> {
        let staging = self.staging_path();
        if !staging.exists() {
            return Ok(false);
        }
        fs::remove_file(&staging)?;
        Ok(true)
    }
}

/// Syncs the directory holding `path` so a rename or removal is durable.
///
/// Windows NTFS journals metadata updates, so directory fsync is skipped there.
#[cfg(unix)]
pub(crate) fn sync_parent_dir(path: &Path) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn sync_parent_dir(_path: &Path) -> StorageResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn file_append_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut backend = FileBackend::open(&path).unwrap();

        let offset1 = backend.append(b"hello").unwrap();
        assert_eq!(offset1, 0);

        let offset2 = backend.append(b" world").unwrap();
        assert_eq!(offset2, 5);

        assert_eq!(backend.size().unwrap(), 11);

        let data = backend.read_at(0, 11).unwrap();
        assert_eq!(&data, b"hello world");
    }

    #[test]
    fn file_read_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"hello").unwrap();

        let result = backend.read_at(3, 5);
        assert!(matches!(
            result,
            Err(StorageError::OffsetOutOfRange { offset: 3, len: 5, size: 5 })
        ));
    }

    #[test]
    fn file_write_at_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut backend = FileBackend::open(&path).unwrap().with_sync_writes(true);
        backend.append(b"hello world").unwrap();
        backend.write_at(6, b"WORLD").unwrap();

        assert_eq!(backend.size().unwrap(), 11);
        assert_eq!(&backend.read_at(0, 11).unwrap(), b"hello WORLD");
    }

    #[test]
    fn file_write_at_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"hello").unwrap();

        let result = backend.write_at(3, b"xyz");
        assert!(result.unwrap_err().is_out_of_range());
        assert_eq!(&backend.read_at(0, 5).unwrap(), b"hello");
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"persistent data").unwrap();
            backend.sync().unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 15);
        assert_eq!(&backend.read_at(0, 15).unwrap(), b"persistent data");
    }

    #[test]
    fn file_sees_external_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let backend = FileBackend::open(&path).unwrap();
        fs::write(&path, b"written elsewhere").unwrap();

        assert_eq!(backend.size().unwrap(), 17);
        assert_eq!(&backend.read_at(0, 7).unwrap(), b"written");
    }

    #[test]
    fn file_truncate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"hello world").unwrap();
        backend.truncate(5).unwrap();
        assert_eq!(backend.size().unwrap(), 5);

        let result = backend.truncate(50);
        assert!(matches!(
            result,
            Err(StorageError::TruncateBeyondEnd { requested: 50, size: 5 })
        ));
    }

    #[test]
    fn file_staged_replace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"old contents").unwrap();

        let mut staged = backend.stage().unwrap();
        assert!(backend.staging_path().exists());
        staged.append(b"new").unwrap();

        // Untouched until installed
        assert_eq!(backend.size().unwrap(), 12);

        backend.install(staged).unwrap();
        assert_eq!(backend.size().unwrap(), 3);
        assert_eq!(&backend.read_at(0, 3).unwrap(), b"new");
        assert!(!backend.staging_path().exists());
    }

    #[test]
    fn file_discard_stale_staging() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"keep").unwrap();
        let mut staged = backend.stage().unwrap();
        staged.append(b"abandoned").unwrap();
        drop(staged);

        assert!(backend.discard_staging().unwrap());
        assert!(!backend.discard_staging().unwrap());
        assert_eq!(&backend.read_at(0, 4).unwrap(), b"keep");
    }

    #[test]
    fn file_open_requires_parent_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("test.db");

        assert!(FileBackend::open(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn file_staging_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.db");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.path(), path);
        assert_eq!(backend.staging_path(), dir.path().join("users.db.tmp"));
    }
}
