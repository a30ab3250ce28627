//! Atomic whole-content replacement.

use crate::backend::StorageBackend;
use crate::error::StorageResult;

/// A backend whose entire contents can be rebuilt off to the side and then
/// swapped in atomically.
///
/// Compaction writes the surviving frames into a staged backend and only then
/// installs it. Until `install` returns, readers of the original backend see
/// the pre-replacement bytes; afterwards they see only the staged bytes.
///
/// If the process stops between `stage` and `install`, the staging area is
/// left behind and [`discard_staging`](StagedReplace::discard_staging)
/// removes it on the next start.
pub trait StagedReplace: StorageBackend + Sized {
    /// Creates an empty staging backend, discarding any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the staging area cannot be created.
    fn stage(&self) -> StorageResult<Self>;

    /// Replaces the contents of `self` with the contents of `staged`.
    ///
    /// # Errors
    ///
    /// Returns an error if the staged data cannot be made durable or the swap
    /// fails. An error after the swap itself (such as a failed directory
    /// sync) leaves the staged contents in place, so callers must re-read
    /// the backend rather than assume the original survived.
    fn install(&mut self, staged: Self) -> StorageResult<()>;

    /// Removes a staging area left over from an interrupted replacement.
    ///
    /// Returns `true` if one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the leftover cannot be removed.
    fn discard_staging(&self) -> StorageResult<bool>;
}
