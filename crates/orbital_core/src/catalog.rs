//! Catalog: the registry of collections in one database directory.

use crate::collection::{Collection, CollectionOptions};
use crate::config::Config;
use crate::dir::{validate_collection_name, DatabaseDir};
use crate::error::CoreResult;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Shared handle to an open collection.
pub type CollectionHandle = Arc<Mutex<Collection>>;

/// The main database handle.
///
/// A `Catalog` owns a database directory for its whole lifetime (through an
/// exclusive lock on `LOCK`) and opens each collection at most once. Every
/// caller asking for the same name gets the same handle, so all writes to a
/// collection go through one [`Collection`].
///
/// ```no_run
/// use orbital_core::{Catalog, Config};
/// use serde_json::json;
/// use std::path::Path;
///
/// let catalog = Catalog::open(Path::new("data"), Config::default())?;
/// let users = catalog.collection("users")?;
/// users.lock().insert_value(json!({ "id": 1, "name": "ada" }))?;
/// # Ok::<(), orbital_core::CoreError>(())
/// ```
#[derive(Debug)]
pub struct Catalog {
    dir: DatabaseDir,
    config: Config,
    collections: RwLock<HashMap<String, CollectionHandle>>,
}

impl Catalog {
    /// Opens the database directory at `path`.
    ///
    /// # Errors
    ///
    /// - the directory is missing and `config.create_if_missing` is false
    /// - another `Catalog` holds the directory (`DatabaseLocked`)
    /// - I/O errors
    pub fn open(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = DatabaseDir::open(path, config.create_if_missing)?;
        info!(path = %path.display(), "catalog opened");
        Ok(Self {
            dir,
            config,
            collections: RwLock::new(HashMap::new()),
        })
    }

    /// Path of the database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The configuration every collection is opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the collection `name`, opening it with default options on
    /// first use.
    ///
    /// # Errors
    ///
    /// See [`collection_with`](Self::collection_with).
    pub fn collection(&self, name: &str) -> CoreResult<CollectionHandle> {
        self.collection_with(name, CollectionOptions::default())
    }

    /// Returns the collection `name`, opening it with `options` on first
    /// use. If it is already open, `options` is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the collection cannot be
    /// opened.
    pub fn collection_with(
        &self,
        name: &str,
        options: CollectionOptions,
    ) -> CoreResult<CollectionHandle> {
        validate_collection_name(name)?;

        if let Some(handle) = self.collections.read().get(name) {
            return Ok(Arc::clone(handle));
        }

        let mut collections = self.collections.write();
        if let Some(handle) = collections.get(name) {
            return Ok(Arc::clone(handle));
        }

        let collection = Collection::open(self.dir.path(), name, options, &self.config)?;
        let handle = Arc::new(Mutex::new(collection));
        collections.insert(name.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Returns the collection `name` if it has been opened.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<CollectionHandle> {
        self.collections.read().get(name).map(Arc::clone)
    }

    /// Names of the opened collections, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of every collection with a log file in the directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn discover(&self) -> CoreResult<Vec<String>> {
        self.dir.discover_collections()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::types::DocumentId;
    use serde_json::json;
    use std::thread;
    use tempfile::tempdir;

    fn config() -> Config {
        Config::default().sync_writes(false)
    }

    #[test]
    fn same_name_same_handle() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path(), config()).unwrap();

        let a = catalog.collection("users").unwrap();
        let b = catalog.collection("users").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(catalog.names(), vec!["users"]);
        assert!(catalog.get("posts").is_none());
    }

    #[test]
    fn second_catalog_is_locked_out() {
        let dir = tempdir().unwrap();
        let _catalog = Catalog::open(dir.path(), config()).unwrap();
        assert!(matches!(
            Catalog::open(dir.path(), config()),
            Err(CoreError::DatabaseLocked)
        ));
    }

    #[test]
    fn discover_finds_unopened_collections() {
        let dir = tempdir().unwrap();
        {
            let catalog = Catalog::open(dir.path(), config()).unwrap();
            catalog.collection("b").unwrap();
            catalog.collection("a").unwrap();
        }
        let catalog = Catalog::open(dir.path(), config()).unwrap();
        assert!(catalog.names().is_empty());
        assert_eq!(catalog.discover().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn invalid_name_is_rejected() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path(), config()).unwrap();
        assert!(matches!(
            catalog.collection("a/b"),
            Err(CoreError::InvalidCollectionName { .. })
        ));
    }

    #[test]
    fn writers_on_threads_share_one_collection() {
        let dir = tempdir().unwrap();
        let catalog = Arc::new(Catalog::open(dir.path(), config()).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let catalog = Arc::clone(&catalog);
                thread::spawn(move || {
                    let users = catalog.collection("users").unwrap();
                    for i in 0..25 {
                        let id = t * 100 + i;
                        users.lock().insert_value(json!({ "id": id })).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let users = catalog.collection("users").unwrap();
        let users = users.lock();
        assert_eq!(users.len(), 100);
        assert!(users.contains(&DocumentId::Int(325)));
        assert!(users.verify().unwrap().is_consistent());
    }
}
