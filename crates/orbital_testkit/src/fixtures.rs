//! Test fixtures and database helpers.
//!
//! Provides temporary database directories that clean up after
//! themselves and can be closed and reopened to exercise recovery.

use orbital_core::{Catalog, CollectionHandle, Config, Document, DocumentId};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Configuration used by fixtures: no fsync, everything else default.
#[must_use]
pub fn test_config() -> Config {
    Config::default().sync_writes(false)
}

/// Converts a JSON object into a [`Document`].
///
/// # Panics
///
/// Panics if `value` is not an object.
#[must_use]
pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// A catalog in a temporary directory.
///
/// The directory outlives the catalog, so the database can be closed and
/// reopened any number of times before the fixture is dropped.
pub struct TestCatalog {
    catalog: Option<Catalog>,
    config: Config,
    dir: TempDir,
}

impl TestCatalog {
    /// Opens a fresh catalog with [`test_config`].
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory or catalog cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Opens a fresh catalog with `config`.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory or catalog cannot be created.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let catalog = Catalog::open(dir.path(), config.clone()).expect("Failed to open catalog");
        Self {
            catalog: Some(catalog),
            config,
            dir,
        }
    }

    /// Returns the database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the log path of collection `name`.
    #[must_use]
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{name}.db"))
    }

    /// Returns the open catalog.
    ///
    /// # Panics
    ///
    /// Panics if the catalog is closed.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        self.catalog.as_ref().expect("catalog is closed")
    }

    /// Opens collection `name`.
    ///
    /// # Panics
    ///
    /// Panics if the collection cannot be opened.
    #[must_use]
    pub fn collection(&self, name: &str) -> CollectionHandle {
        self.catalog()
            .collection(name)
            .expect("Failed to open collection")
    }

    /// Closes the catalog, releasing the directory lock and every
    /// collection handle it owns.
    pub fn close(&mut self) {
        self.catalog = None;
    }

    /// Closes and reopens the catalog.
    ///
    /// # Panics
    ///
    /// Panics if the catalog cannot be reopened.
    pub fn reopen(&mut self) {
        self.close();
        let catalog =
            Catalog::open(self.dir.path(), self.config.clone()).expect("Failed to reopen catalog");
        self.catalog = Some(catalog);
    }
}

impl Default for TestCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a temporary catalog.
///
/// # Example
///
/// ```rust,ignore
/// use orbital_testkit::with_temp_catalog;
///
/// #[test]
/// fn my_test() {
///     with_temp_catalog(|catalog| {
///         let users = catalog.collection("users").unwrap();
///         // ... test operations
///     });
/// }
/// ```
pub fn with_temp_catalog<F, R>(f: F) -> R
where
    F: FnOnce(&Catalog) -> R,
{
    let fixture = TestCatalog::new();
    f(fixture.catalog())
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a catalog whose `users` collection holds documents with ids
    /// `0..count`.
    ///
    /// # Panics
    ///
    /// Panics if an insert fails.
    #[must_use]
    pub fn populated_catalog(count: i64) -> TestCatalog {
        let fixture = TestCatalog::new();
        {
            let users = fixture.collection("users");
            let mut users = users.lock();
            for i in 0..count {
                users
                    .insert(numbered_doc(i))
                    .expect("Failed to insert document");
            }
        }
        fixture
    }

    /// Builds the document `{"id": i, "name": "user-<i>", "rank": i % 7}`.
    #[must_use]
    pub fn numbered_doc(i: i64) -> Document {
        doc(serde_json::json!({
            "id": i,
            "name": format!("user-{i}"),
            "rank": i % 7,
        }))
    }

    /// Returns the ids `0..count`.
    #[must_use]
    pub fn numbered_ids(count: i64) -> Vec<DocumentId> {
        (0..count).map(DocumentId::Int).collect()
    }
}
