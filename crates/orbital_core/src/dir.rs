//! Database directory management.
//!
//! This module handles the file system layout for OrbitalDB:
//!
//! ```text
//! <db_path>/
//! ├─ LOCK                    # Advisory lock for single-process access
//! ├─ <name>.db               # Log store (concatenated frames)
//! ├─ <name>.db.idx           # Index mirror snapshot
//! ├─ <name>.db.idx.log       # Index mirror deltas since the snapshot
//! ├─ <name>.journal          # Pending mutation, present only mid-write
//! └─ <name>.db.tmp           # Compaction staging, present only mid-compaction
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_EXT: &str = "db";

/// Paths of every file belonging to one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPaths {
    /// `<name>.db`
    pub log: PathBuf,
    /// `<name>.db.idx`
    pub index_snapshot: PathBuf,
    /// `<name>.db.idx.log`
    pub index_deltas: PathBuf,
    /// `<name>.journal`
    pub journal: PathBuf,
}

impl CollectionPaths {
    /// Derives the file paths for collection `name` inside `dir`.
    #[must_use]
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            log: dir.join(format!("{name}.{LOG_EXT}")),
            index_snapshot: dir.join(format!("{name}.{LOG_EXT}.idx")),
            index_deltas: dir.join(format!("{name}.{LOG_EXT}.idx.log")),
            journal: dir.join(format!("{name}.journal")),
        }
    }
}

/// Checks that `name` can be used as a collection file stem.
///
/// # Errors
///
/// Returns [`CoreError::InvalidCollectionName`] unless the name is non-empty
/// and made of ASCII letters, digits, `_` and `-`.
pub fn validate_collection_name(name: &str) -> CoreResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidCollectionName {
            name: name.to_string(),
        })
    }
}

/// Manages the database directory and its lock.
///
/// The `DatabaseDir` holds an exclusive advisory lock on `LOCK` for as long
/// as it lives, so at most one handle per directory can exist at a time.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens or creates a database directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another handle holds the lock (returns `DatabaseLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_operation(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_operation(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file paths for collection `name`.
    #[must_use]
    pub fn collection_paths(&self, name: &str) -> CollectionPaths {
        CollectionPaths::new(&self.path, name)
    }

    /// Lists the collections that have a log file in this directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn discover_collections(&self) -> CoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_collection_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Writes `data` to `path` so that readers see either the old or the new
/// contents, never a mix.
///
/// Uses the write-then-rename pattern:
/// 1. Write to `<path>.tmp`
/// 2. Sync the temporary file (when `sync` is set)
/// 3. Rename it over `path`
/// 4. Sync the parent directory (when `sync` is set)
///
/// # Errors
///
/// Returns an error if any step fails; `path` is unchanged in that case.
pub fn write_atomic(path: &Path, data: &[u8], sync: bool) -> CoreResult<()> {
    let mut temp = path.to_path_buf().into_os_string();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    let mut file = File::create(&temp)?;
    file.write_all(data)?;
    if sync {
        file.sync_all()?;
    }
    drop(file);

    fs::rename(&temp, path)?;

    if sync {
        sync_parent(path)?;
    }
    Ok(())
}

/// Removes `path` if it exists. Returns whether a file was removed.
///
/// # Errors
///
/// Returns an error for failures other than the file being absent.
pub fn remove_if_exists(path: &Path) -> CoreResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Syncs the directory containing `path` so metadata updates are durable.
///
/// Windows NTFS journals metadata, so directory fsync is skipped there.
#[cfg(unix)]
pub fn sync_parent(path: &Path) -> CoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn sync_parent(_path: &Path) -> CoreResult<()> {
    Ok(())
}
