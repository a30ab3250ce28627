//! Core type definitions for OrbitalDB.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A stored document: a JSON object keyed by field name.
///
/// Every document carries its primary key in the [`ID_FIELD`] field.
pub type Document = serde_json::Map<String, Value>;

/// Name of the primary-key field.
pub const ID_FIELD: &str = "id";

/// Primary key of a document.
///
/// Identifiers are either JSON integers that fit in an `i64` or JSON
/// strings. They serialize untagged, so `DocumentId::Int(7)` is written as
/// `7` and `DocumentId::Text("a".into())` as `"a"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    /// Integer identifier.
    Int(i64),
    /// String identifier.
    Text(String),
}

impl DocumentId {
    /// Interprets a JSON value as an identifier.
    ///
    /// Returns `None` for anything other than an `i64`-sized integer or a
    /// string.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Reads the identifier stored in `document`.
    #[must_use]
    pub fn of(document: &Document) -> Option<Self> {
        document.get(ID_FIELD).and_then(Self::from_value)
    }

    /// Converts the identifier back into a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(n) => Value::from(*n),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for DocumentId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for DocumentId {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
