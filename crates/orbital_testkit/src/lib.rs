//! # OrbitalDB Testkit
//!
//! Test utilities for OrbitalDB.
//!
//! This crate provides:
//! - Temporary database fixtures
//! - Property-based test generators using proptest
//! - A crash harness that leaves collections mid-mutation
//! - Golden checks for the on-disk formats
//! - A model harness that checks a collection against a `HashMap`
//! - Concurrent stress runs through the catalog
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orbital_testkit::prelude::*;
//!
//! #[test]
//! fn roundtrip() {
//!     with_temp_catalog(|catalog| {
//!         let users = catalog.collection("users").unwrap();
//!         users.lock().insert(doc(serde_json::json!({"id": 1}))).unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod golden;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use golden::*;
pub use integration::*;
pub use stress::*;
