//! # OrbitalDB Storage
//!
//! Byte-store backends for OrbitalDB.
//!
//! This crate provides the lowest-level storage abstraction for OrbitalDB.
//! Backends are **opaque byte stores** - they do not interpret the frames,
//! index mirrors, or journal entries written through them.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (read, append, overwrite, truncate)
//! - No knowledge of record framing or JSON payloads
//! - Whole-content replacement goes through a staged copy that is installed
//!   atomically ([`StagedReplace`])
//! - [`FileBackend`] acquires a fresh file handle for every call and releases
//!   it before returning, so nothing is cached between calls
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use orbital_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod replace;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use replace::StagedReplace;
