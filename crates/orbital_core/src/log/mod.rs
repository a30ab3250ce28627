//! Append-only log of document frames.
//!
//! A collection's log file is a plain concatenation of frames (see
//! `orbital_codec`). A document's location is the byte offset of its frame.
//! Frames are only ever appended, except for two in-place edits:
//!
//! - deleting flips the flag byte of the live frame to tombstone, keeping
//!   the payload so the frame length never changes
//! - recovery may truncate a torn frame off the tail
//!
//! Compaction rewrites the whole file through a staged copy.

mod compaction;
mod store;

pub use compaction::CompactionStats;
pub use store::{LogRecord, LogScan, LogStore};
