//! # OrbitalDB Core
//!
//! Embedded, log-structured document store.
//!
//! This crate provides:
//! - [`LogStore`]: append-only log of framed JSON documents
//! - [`Index`]: primary (id → offset) and secondary (field → ids) indexes,
//!   with an on-disk mirror of the primary index
//! - [`Journal`]: single-entry intent journal and crash recovery
//! - [`Collection`]: insert / delete / lookup / compaction over one log
//! - [`Catalog`]: registry of collections in a locked directory
//!
//! ## Example
//!
//! ```no_run
//! use orbital_core::{Catalog, CollectionOptions, Config, Query};
//! use serde_json::json;
//! use std::path::Path;
//!
//! let catalog = Catalog::open(Path::new("data"), Config::default())?;
//! let users = catalog.collection_with("users", CollectionOptions::new().index_field("email"))?;
//!
//! let mut users = users.lock();
//! users.insert_value(json!({ "id": 1, "email": "ada@example.com" }))?;
//! let found = users.find_one(&Query::field("email", "ada@example.com"))?;
//! assert!(found.is_some());
//! # Ok::<(), orbital_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod collection;
mod config;
mod dir;
mod error;
mod index;
mod journal;
mod log;
mod schema;
mod stats;
mod types;

pub use catalog::{Catalog, CollectionHandle};
pub use collection::{Collection, CollectionOptions, Query};
pub use config::{CompactionPolicy, Config};
pub use dir::{validate_collection_name, CollectionPaths, DatabaseDir};
pub use error::{CoreError, CoreResult};
pub use index::{Delta, FieldKey, Index, IndexMirror, RebuildSource, SecondaryIndex};
pub use journal::{recover, Journal, JournalEntry, Mutation, MutationKind, RecoveryOutcome};
pub use log::{CompactionStats, LogRecord, LogScan, LogStore};
pub use schema::{json_type_name, FieldKind, FieldRule, Schema, ValidationError, Validator};
pub use stats::{CollectionStats, CountersSnapshot, OperationCounters, VerifyReport};
pub use types::{Document, DocumentId, ID_FIELD};

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
