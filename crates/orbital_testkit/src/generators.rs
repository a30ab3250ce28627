//! Property-based test generators using proptest.
//!
//! Ids are drawn from a small space so generated operation sequences
//! overwrite and delete the same documents often.

use orbital_core::{Document, DocumentId};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for integer and string document ids.
pub fn document_id_strategy() -> impl Strategy<Value = DocumentId> {
    prop_oneof![
        3 => (0i64..64).prop_map(DocumentId::Int),
        1 => "[a-h]{1,2}".prop_map(DocumentId::Text),
    ]
}

/// Strategy for valid collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_-]{0,31}").expect("Invalid regex")
}

/// Strategy for the non-id fields of a document.
pub fn field_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        (-1000i64..1000).prop_map(Value::from),
        "[a-z ]{0,24}".prop_map(Value::from),
        Just(Value::Null),
        prop::collection::vec(0i64..10, 0..4).prop_map(|v| json!(v)),
    ]
}

/// Strategy for a document with `id`.
///
/// Every document carries a `tag` field drawn from a handful of values so
/// that field lookups find collisions.
pub fn document_strategy(id: DocumentId) -> impl Strategy<Value = Document> {
    (
        prop::sample::select(vec!["red", "green", "blue"]),
        prop::collection::btree_map("[a-z]{1,6}", field_value_strategy(), 0..4),
    )
        .prop_map(move |(tag, extra)| {
            let mut document = Document::new();
            for (key, value) in extra {
                document.insert(key, value);
            }
            document.insert("id".to_string(), id.to_value());
            document.insert("tag".to_string(), Value::from(tag));
            document
        })
}

/// A single collection operation.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Insert or replace a document.
    Insert(Document),
    /// Delete a document.
    Delete(DocumentId),
    /// Look up a document by id.
    Get(DocumentId),
    /// Rewrite the log.
    Compact,
    /// Close and reopen the collection.
    Reopen,
}

/// Strategy for collection operations.
pub fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        6 => document_id_strategy()
            .prop_flat_map(document_strategy)
            .prop_map(Operation::Insert),
        3 => document_id_strategy().prop_map(Operation::Delete),
        2 => document_id_strategy().prop_map(Operation::Get),
        1 => Just(Operation::Compact),
        1 => Just(Operation::Reopen),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<Operation>> {
    prop::collection::vec(operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbital_core::validate_collection_name;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_names_are_accepted(name in collection_name_strategy()) {
            prop_assert!(validate_collection_name(&name).is_ok());
        }

        #[test]
        fn generated_documents_carry_their_id(
            document in document_id_strategy().prop_flat_map(document_strategy)
        ) {
            prop_assert!(DocumentId::of(&document).is_some());
            prop_assert!(document["tag"].is_string());
        }

        #[test]
        fn sequences_respect_bounds(ops in operation_sequence_strategy(5, 20)) {
            prop_assert!(ops.len() >= 5 && ops.len() < 20);
        }
    }
}
