//! Model-based integration harness.
//!
//! [`ModelHarness`] applies operations to a real collection and to an
//! in-memory `BTreeMap`, then checks that every lookup agrees.

use crate::fixtures::{test_config, TestCatalog};
use crate::generators::Operation;
use orbital_core::{
    CollectionHandle, CollectionOptions, Config, Document, DocumentId, Query,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field indexed by the harness collection.
pub const MODEL_INDEXED_FIELD: &str = "tag";

const COLLECTION: &str = "model";

/// A collection paired with the state it should hold.
pub struct ModelHarness {
    fixture: TestCatalog,
    handle: CollectionHandle,
    model: BTreeMap<DocumentId, Document>,
}

impl ModelHarness {
    /// Creates a harness with [`test_config`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Creates a harness with `config`.
    ///
    /// # Panics
    ///
    /// Panics if the collection cannot be opened.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        let fixture = TestCatalog::with_config(config);
        let handle = Self::open(&fixture);
        Self {
            fixture,
            handle,
            model: BTreeMap::new(),
        }
    }

    fn open(fixture: &TestCatalog) -> CollectionHandle {
        fixture
            .catalog()
            .collection_with(
                COLLECTION,
                CollectionOptions::new().index_field(MODEL_INDEXED_FIELD),
            )
            .expect("Failed to open model collection")
    }

    /// Returns the collection under test.
    #[must_use]
    pub fn handle(&self) -> &CollectionHandle {
        &self.handle
    }

    /// Returns the expected contents.
    #[must_use]
    pub fn model(&self) -> &BTreeMap<DocumentId, Document> {
        &self.model
    }

    /// Applies `op` to both the collection and the model.
    ///
    /// # Panics
    ///
    /// Panics if the collection fails or disagrees with the model.
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::Insert(document) => {
                let id = self
                    .handle
                    .lock()
                    .insert(document.clone())
                    .expect("Failed to insert");
                self.model.insert(id, document.clone());
            }
            Operation::Delete(id) => {
                let deleted = self.handle.lock().delete(id).expect("Failed to delete");
                assert_eq!(
                    deleted,
                    self.model.remove(id).is_some(),
                    "delete result mismatch for {id}"
                );
            }
            Operation::Get(id) => {
                let actual = self.handle.lock().get(id).expect("Failed to get");
                assert_eq!(actual.as_ref(), self.model.get(id), "get mismatch for {id}");
            }
            Operation::Compact => {
                let stats = self.handle.lock().compact().expect("Failed to compact");
                assert_eq!(stats.live_records, self.model.len());
            }
            Operation::Reopen => self.reopen(),
        }
    }

    /// Closes and reopens the database.
    pub fn reopen(&mut self) {
        self.fixture.reopen();
        self.handle = Self::open(&self.fixture);
    }

    /// Checks every id, every indexed value and the log itself against the
    /// model.
    ///
    /// # Panics
    ///
    /// Panics on the first disagreement.
    pub fn check(&self) {
        let collection = self.handle.lock();

        assert_eq!(collection.len(), self.model.len(), "document count");
        assert_eq!(
            collection.ids(),
            self.model.keys().cloned().collect::<Vec<_>>(),
            "id set"
        );
        for (id, expected) in &self.model {
            let actual = collection.get(id).expect("Failed to get");
            assert_eq!(actual.as_ref(), Some(expected), "content of {id}");
        }

        for tag in ["red", "green", "blue"] {
            let query = Query::Field {
                name: MODEL_INDEXED_FIELD.to_string(),
                value: Value::from(tag),
            };
            let expected = self
                .model
                .values()
                .find(|d| d.get(MODEL_INDEXED_FIELD) == Some(&Value::from(tag)));
            let actual = collection.find_one(&query).expect("Failed to query");
            assert_eq!(actual.as_ref(), expected, "lookup of {tag}");
        }

        let report = collection.verify().expect("Failed to verify");
        assert!(report.is_consistent(), "verify issues: {:?}", report.issues);
    }

    /// Applies every operation in `ops`, checking after each one.
    pub fn run(&mut self, ops: &[Operation]) {
        for op in ops {
            self.apply(op);
            self.check();
        }
    }
}

impl Default for ModelHarness {
    fn default() -> Self {
        Self::new()
    }
}
