//! Exact-match queries.

use crate::error::{CoreError, CoreResult};
use crate::schema::json_type_name;
use crate::types::{DocumentId, ID_FIELD};
use serde_json::Value;

/// A lookup understood by [`Collection::find_one`](super::Collection::find_one).
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Match the document with this id.
    Id(DocumentId),
    /// Match a document whose `name` field equals `value`.
    Field {
        /// Field name.
        name: String,
        /// Value to match.
        value: Value,
    },
}

impl Query {
    /// Matches a document by id.
    pub fn id(id: impl Into<DocumentId>) -> Self {
        Self::Id(id.into())
    }

    /// Matches a document by a field value.
    pub fn field(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Field {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Interprets a JSON query.
    ///
    /// - an integer or string is an id
    /// - `{"id": x}` is an id
    /// - `{"field": value}` is a field match
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidQuery`] for objects with zero or several
    /// keys, ids of the wrong type, and any other JSON value.
    pub fn from_value(value: &Value) -> CoreResult<Self> {
        match value {
            Value::Object(map) => {
                let mut entries = map.iter();
                match (entries.next(), entries.next()) {
                    (Some((name, value)), None) if name == ID_FIELD => {
                        Self::parse_id(value).map(Self::Id)
                    }
                    (Some((name, value)), None) => Ok(Self::Field {
                        name: name.clone(),
                        value: value.clone(),
                    }),
                    (None, _) => Err(CoreError::invalid_query("query object is empty")),
                    (Some(_), Some(_)) => Err(CoreError::invalid_query(format!(
                        "query must name exactly one field, got {}",
                        map.len()
                    ))),
                }
            }
            other => Self::parse_id(other).map(Self::Id),
        }
    }

    fn parse_id(value: &Value) -> CoreResult<DocumentId> {
        DocumentId::from_value(value).ok_or_else(|| {
            CoreError::invalid_query(format!(
                "id must be an integer or a string, got {}",
                json_type_name(value)
            ))
        })
    }
}

impl From<DocumentId> for Query {
    fn from(id: DocumentId) -> Self {
        Self::Id(id)
    }
}

impl From<i64> for Query {
    fn from(id: i64) -> Self {
        Self::Id(DocumentId::Int(id))
    }
}

impl From<&str> for Query {
    fn from(id: &str) -> Self {
        Self::Id(DocumentId::from(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_are_ids() {
        assert_eq!(Query::from_value(&json!(3)).unwrap(), Query::id(3));
        assert_eq!(Query::from_value(&json!("k")).unwrap(), Query::id("k"));
    }

    #[test]
    fn id_object_is_id() {
        assert_eq!(Query::from_value(&json!({ "id": 1 })).unwrap(), Query::id(1));
    }

    #[test]
    fn single_field_object() {
        assert_eq!(
            Query::from_value(&json!({ "email": "a@b" })).unwrap(),
            Query::field("email", "a@b")
        );
    }

    #[test]
    fn rejected_queries() {
        for bad in [
            json!({ "a": 1, "b": 2 }),
            json!({}),
            json!(null),
            json!(1.5),
            json!([1]),
            json!({ "id": true }),
        ] {
            let err = Query::from_value(&bad).unwrap_err();
            assert!(matches!(err, CoreError::InvalidQuery { .. }), "{bad}");
        }
    }
}
