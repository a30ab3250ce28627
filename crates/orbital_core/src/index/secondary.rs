//! Secondary (field value) indexes.

use crate::types::{Document, DocumentId};
use serde_json::{Number, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Index key for a field value.
///
/// Keys are the canonical JSON text of scalar values, so `"1"` (a string)
/// and `1` (a number) are distinct keys. Numbers compare by value: an
/// integral float such as `30.0` shares the key of `30`. `null`, objects
/// and arrays are not indexed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldKey(String);

impl FieldKey {
    /// Builds the key for `value`, or `None` if the value is not indexable.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self(canonical_number(n))),
            Value::Bool(_) | Value::String(_) => Some(Self(value.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Returns the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Largest magnitude below which every integral `f64` is an exact integer.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

fn canonical_number(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_EXACT_INTEGER => {
            // Exact by the bound above; also folds -0.0 into 0.
            (f as i64).to_string()
        }
        _ => n.to_string(),
    }
}

/// Maps the values of one field to the ids of the documents holding them.
#[derive(Debug, Clone, Default)]
pub struct SecondaryIndex {
    field: String,
    by_value: BTreeMap<FieldKey, BTreeSet<DocumentId>>,
    by_id: HashMap<DocumentId, FieldKey>,
}

impl SecondaryIndex {
    /// Creates an empty index over `field`.
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Self::default()
        }
    }

    /// Returns the indexed field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Records the current version of a document, replacing whatever was
    /// recorded for its id before.
    pub fn insert(&mut self, id: &DocumentId, document: &Document) {
        self.remove(id);

        let Some(key) = document.get(&self.field).and_then(FieldKey::from_value) else {
            return;
        };
        self.by_value
            .entry(key.clone())
            .or_default()
            .insert(id.clone());
        self.by_id.insert(id.clone(), key);
    }

    /// Forgets the entry for `id`.
    pub fn remove(&mut self, id: &DocumentId) {
        let Some(key) = self.by_id.remove(id) else {
            return;
        };
        if let Some(ids) = self.by_value.get_mut(&key) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_value.remove(&key);
            }
        }
    }

    /// Returns the smallest id whose document holds `value`.
    #[must_use]
    pub fn lookup(&self, value: &Value) -> Option<&DocumentId> {
        let key = FieldKey::from_value(value)?;
        self.by_value.get(&key).and_then(|ids| ids.iter().next())
    }

    /// Number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns `true` if no document is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.by_value.clear();
        self.by_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn scalar_keys_only() {
        assert!(FieldKey::from_value(&json!("a")).is_some());
        assert!(FieldKey::from_value(&json!(3)).is_some());
        assert!(FieldKey::from_value(&json!(false)).is_some());
        assert!(FieldKey::from_value(&json!(null)).is_none());
        assert!(FieldKey::from_value(&json!([1])).is_none());
        assert!(FieldKey::from_value(&json!({ "a": 1 })).is_none());
        assert_ne!(
            FieldKey::from_value(&json!("1")),
            FieldKey::from_value(&json!(1))
        );
    }

    #[test]
    fn lookup_returns_smallest_id() {
        let mut index = SecondaryIndex::new("email");
        index.insert(&DocumentId::Int(5), &doc(json!({ "id": 5, "email": "x" })));
        index.insert(&DocumentId::Int(2), &doc(json!({ "id": 2, "email": "x" })));

        assert_eq!(index.lookup(&json!("x")), Some(&DocumentId::Int(2)));
        assert_eq!(index.lookup(&json!("y")), None);

        index.remove(&DocumentId::Int(2));
        assert_eq!(index.lookup(&json!("x")), Some(&DocumentId::Int(5)));
    }

    #[test]
    fn integral_floats_match_integers() {
        assert_eq!(
            FieldKey::from_value(&json!(30.0)),
            FieldKey::from_value(&json!(30))
        );
        assert_eq!(
            FieldKey::from_value(&json!(-0.0)),
            FieldKey::from_value(&json!(0))
        );
        assert_ne!(
            FieldKey::from_value(&json!(30.5)),
            FieldKey::from_value(&json!(30))
        );

        let mut index = SecondaryIndex::new("age");
        index.insert(&DocumentId::Int(1), &doc(json!({ "id": 1, "age": 30 })));
        index.insert(&DocumentId::Int(2), &doc(json!({ "id": 2, "age": 41.0 })));

        assert_eq!(index.lookup(&json!(30.0)), Some(&DocumentId::Int(1)));
        assert_eq!(index.lookup(&json!(41)), Some(&DocumentId::Int(2)));
    }

    #[test]
    fn insert_replaces_previous_value() {
        let mut index = SecondaryIndex::new("email");
        let id = DocumentId::Int(1);
        index.insert(&id, &doc(json!({ "id": 1, "email": "old" })));
        index.insert(&id, &doc(json!({ "id": 1, "email": "new" })));

        assert_eq!(index.lookup(&json!("old")), None);
        assert_eq!(index.lookup(&json!("new")), Some(&id));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_forgets_id() {
        let mut index = SecondaryIndex::new("email");
        let id = DocumentId::from("u1");
        index.insert(&id, &doc(json!({ "id": "u1", "email": "a" })));
        index.remove(&id);
        index.remove(&id);

        assert!(index.is_empty());
        assert_eq!(index.lookup(&json!("a")), None);
    }

    #[test]
    fn documents_without_field_are_skipped() {
        let mut index = SecondaryIndex::new("email");
        index.insert(&DocumentId::Int(1), &doc(json!({ "id": 1 })));
        index.insert(&DocumentId::Int(2), &doc(json!({ "id": 2, "email": null })));
        assert!(index.is_empty());
    }
}
