//! Document validation.
//!
//! The engine only insists that a document is a JSON object with a usable
//! `id`. Anything beyond that is delegated to a [`Validator`], which runs
//! before a single byte is written. [`Schema`] is the stock implementation
//! and reads the descriptor format used by existing collections:
//!
//! ```json
//! { "id": { "type": "number", "required": true }, "name": { "type": "string" } }
//! ```

use crate::types::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Reasons a document can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The document is not a JSON object.
    #[error("document must be a JSON object")]
    NotAnObject,

    /// The document has no `id` field.
    #[error("document has no `id` field")]
    MissingId,

    /// The `id` field is not an integer or string.
    #[error("`id` must be an integer or a string, got {found}")]
    InvalidId {
        /// JSON type that was found.
        found: &'static str,
    },

    /// A required field is absent.
    #[error("missing required field `{field}`")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// A field holds a value of the wrong type.
    #[error("field `{field}` must be {expected}, got {found}")]
    TypeMismatch {
        /// Field name.
        field: String,
        /// Declared type.
        expected: FieldKind,
        /// JSON type that was found.
        found: &'static str,
    },
}

/// Checks documents before they are written.
///
/// Implementations must not perform I/O on the collection's files.
pub trait Validator: Send + Sync {
    /// Returns `Ok(())` if `document` may be stored.
    ///
    /// # Errors
    ///
    /// Returns the first rule the document violates.
    fn validate(&self, document: &Document) -> Result<(), ValidationError>;
}

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Any JSON value.
    #[default]
    Any,
    /// Any JSON number.
    Number,
    /// A JSON number without a fractional part.
    Integer,
    /// A JSON string.
    String,
    /// `true` or `false`.
    Boolean,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl FieldKind {
    /// Returns `true` if `value` has this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::Number => "a number",
            Self::Integer => "an integer",
            Self::String => "a string",
            Self::Boolean => "a boolean",
            Self::Object => "an object",
            Self::Array => "an array",
        };
        f.write_str(name)
    }
}

/// Rule for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldRule {
    /// Expected type.
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    /// Whether the field must be present.
    #[serde(default)]
    pub required: bool,
}

/// A field-by-field schema.
///
/// Fields not mentioned in the schema are accepted as-is. `null` is treated
/// as absent for required-field checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: BTreeMap<String, FieldRule>,
}

impl Schema {
    /// Creates a schema that accepts every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an optional field of the given type.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(
            name.into(),
            FieldRule {
                kind,
                required: false,
            },
        );
        self
    }

    /// Adds a required field of the given type.
    #[must_use]
    pub fn required(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(
            name.into(),
            FieldRule {
                kind,
                required: true,
            },
        );
        self
    }

    /// Parses a schema descriptor from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor is malformed.
    pub fn from_json(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Returns the rule for `name`, if any.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.fields.get(name)
    }
}

impl Validator for Schema {
    fn validate(&self, document: &Document) -> Result<(), ValidationError> {
        for (name, rule) in &self.fields {
            match document.get(name) {
                None | Some(Value::Null) if rule.required => {
                    return Err(ValidationError::MissingField {
                        field: name.clone(),
                    });
                }
                None | Some(Value::Null) => {}
                Some(value) if !rule.kind.matches(value) => {
                    return Err(ValidationError::TypeMismatch {
                        field: name.clone(),
                        expected: rule.kind,
                        found: json_type_name(value),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Returns the JSON type name of `value` for error messages.
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
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
    fn empty_schema_accepts_anything() {
        let schema = Schema::new();
        assert!(schema.validate(&doc(json!({ "id": 1, "x": [1, 2] }))).is_ok());
    }

    #[test]
    fn parses_descriptor_format() {
        let schema = Schema::from_json(json!({
            "id": { "type": "number", "required": true },
            "val": { "type": "string", "required": true },
            "note": { "type": "string" }
        }))
        .unwrap();

        assert_eq!(
            schema.rule("id"),
            Some(&FieldRule {
                kind: FieldKind::Number,
                required: true
            })
        );
        assert!(!schema.rule("note").unwrap().required);
        assert!(schema.validate(&doc(json!({ "id": 1, "val": "a" }))).is_ok());
    }

    #[test]
    fn missing_required_field() {
        let schema = Schema::new().required("val", FieldKind::String);
        let err = schema.validate(&doc(json!({ "id": 1 }))).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                field: "val".into()
            }
        );

        let err = schema
            .validate(&doc(json!({ "id": 1, "val": null })))
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { .. }));
    }

    #[test]
    fn type_mismatch() {
        let schema = Schema::new().field("age", FieldKind::Integer);
        let err = schema
            .validate(&doc(json!({ "id": 1, "age": 3.5 })))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::TypeMismatch {
                field: "age".into(),
                expected: FieldKind::Integer,
                found: "number"
            }
        );

        assert!(schema.validate(&doc(json!({ "id": 1, "age": 35 }))).is_ok());
        assert!(schema.validate(&doc(json!({ "id": 1 }))).is_ok());
    }

    #[test]
    fn error_messages() {
        let err = ValidationError::TypeMismatch {
            field: "name".into(),
            expected: FieldKind::String,
            found: "boolean",
        };
        assert_eq!(err.to_string(), "field `name` must be a string, got boolean");
    }
}
