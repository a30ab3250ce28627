//! Per-collection options.

use crate::config::CompactionPolicy;
use crate::schema::{Schema, Validator};
use std::fmt;
use std::sync::Arc;

/// Options fixed when a collection is opened.
#[derive(Clone, Default)]
pub struct CollectionOptions {
    validator: Option<Arc<dyn Validator>>,
    indexed_fields: Vec<String>,
    compaction: CompactionPolicy,
}

impl CollectionOptions {
    /// Options with no validator, no secondary indexes and the default
    /// compaction policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks every inserted document with `validator`.
    #[must_use]
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Checks every inserted document against `schema`.
    #[must_use]
    pub fn with_schema(self, schema: Schema) -> Self {
        self.with_validator(schema)
    }

    /// Maintains a secondary index on `field`.
    #[must_use]
    pub fn index_field(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.indexed_fields.contains(&field) {
            self.indexed_fields.push(field);
        }
        self
    }

    /// Sets the policy used by `compact_if_needed`.
    #[must_use]
    pub const fn with_compaction_policy(mut self, policy: CompactionPolicy) -> Self {
        self.compaction = policy;
        self
    }

    /// The configured validator, if any.
    #[must_use]
    pub fn validator(&self) -> Option<&dyn Validator> {
        self.validator.as_deref()
    }

    /// Fields with a secondary index.
    #[must_use]
    pub fn indexed_fields(&self) -> &[String] {
        &self.indexed_fields
    }

    /// The compaction policy.
    #[must_use]
    pub const fn compaction_policy(&self) -> CompactionPolicy {
        self.compaction
    }
}

impl fmt::Debug for CollectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionOptions")
            .field("validator", &self.validator.is_some())
            .field("indexed_fields", &self.indexed_fields)
            .field("compaction", &self.compaction)
            .finish()
    }
}
