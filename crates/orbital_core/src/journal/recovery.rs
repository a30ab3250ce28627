//! Resolution of an interrupted mutation.

use super::{Journal, Mutation, MutationKind};
use crate::error::CoreResult;
use crate::index::IndexMirror;
use crate::log::LogStore;
use crate::types::{Document, DocumentId};
use orbital_codec::encode;
use orbital_storage::StagedReplace;
use serde::Serialize;
use tracing::{info, warn};

/// What recovery did with the journal found at open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// No mutation was pending.
    Clean,
    /// The mutation had not reached the log and was applied now.
    Replayed(MutationKind),
    /// The log already reflected the mutation.
    AlreadyApplied(MutationKind),
    /// The mutation left nothing durable behind and was undone.
    RolledBack(MutationKind),
    /// The journal and log disagreed in a way that could not be resolved
    /// safely; the log was left as it is.
    Discarded {
        /// What was inconsistent.
        reason: String,
    },
}

impl RecoveryOutcome {
    /// Returns `true` if no journal entry was found.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

/// Resolves the pending journal entry against `log` and clears it.
///
/// Must run before the index is built. Any outcome other than
/// [`RecoveryOutcome::Clean`] means the index mirror may describe a state
/// the log never reached, so `mirror` is invalidated before the journal is
/// cleared. A crash between the two leaves the entry pending and the next
/// open resolves it again.
///
/// # Errors
///
/// Returns an error only for I/O failures while repairing the log or
/// clearing the journal. Inconsistencies are reported as
/// [`RecoveryOutcome::Discarded`].
pub fn recover<B: StagedReplace>(
    journal: &mut Journal,
    log: &mut LogStore<B>,
    mirror: Option<&mut IndexMirror>,
) -> CoreResult<RecoveryOutcome> {
    if !journal.is_pending() {
        return Ok(RecoveryOutcome::Clean);
    }

    let outcome = match journal.pending() {
        Ok(Some(entry)) => apply(entry.mutation, log)?,
        Ok(None) => return Ok(RecoveryOutcome::Clean),
        Err(e) => RecoveryOutcome::Discarded {
            reason: format!("unreadable journal entry: {e}"),
        },
    };

    match &outcome {
        RecoveryOutcome::Discarded { reason } => {
            warn!(path = %journal.path().display(), %reason, "discarding journal entry");
        }
        other => info!(outcome = ?other, "recovered journaled mutation"),
    }

    if let Some(mirror) = mirror {
        mirror.invalidate()?;
    }
    journal.commit()?;
    Ok(outcome)
}

fn apply<B: StagedReplace>(mutation: Mutation, log: &mut LogStore<B>) -> CoreResult<RecoveryOutcome> {
    match mutation {
        Mutation::Insert {
            document,
            offset,
            frame_len,
        } => recover_insert(log, &document, offset, frame_len),
        Mutation::Delete { id, offset } => recover_delete(log, &id, offset),
        Mutation::Compact => {
            if log.discard_stale_staging()? {
                Ok(RecoveryOutcome::RolledBack(MutationKind::Compact))
            } else {
                Ok(RecoveryOutcome::AlreadyApplied(MutationKind::Compact))
            }
        }
    }
}

fn recover_insert<B: StagedReplace>(
    log: &mut LogStore<B>,
    document: &Document,
    offset: u64,
    frame_len: u64,
) -> CoreResult<RecoveryOutcome> {
    let frame = match encode(document, false) {
        Ok(frame) if frame.len() as u64 == frame_len => frame,
        _ => return Ok(discarded("journaled insert does not re-encode to its frame length")),
    };
    let end = offset + frame_len;
    let size = log.size()?;

    if size == offset {
        log.append(&frame)?;
        return Ok(RecoveryOutcome::Replayed(MutationKind::Insert));
    }

    if size > offset && size < end {
        warn!(offset, size, "truncating torn frame at end of log");
        log.truncate(offset)?;
        log.append(&frame)?;
        return Ok(RecoveryOutcome::Replayed(MutationKind::Insert));
    }

    if size >= end {
        if let Ok(record) = log.read_at(offset) {
            if !record.tombstone && record.frame_len == frame_len && &record.document == document {
                return Ok(RecoveryOutcome::AlreadyApplied(MutationKind::Insert));
            }
        }
        return Ok(discarded(format!(
            "frame at offset {offset} does not hold the journaled insert"
        )));
    }

    Ok(discarded(format!(
        "log is {size} bytes, shorter than journaled insert offset {offset}"
    )))
}

fn recover_delete<B: StagedReplace>(
    log: &mut LogStore<B>,
    id: &DocumentId,
    offset: u64,
) -> CoreResult<RecoveryOutcome> {
    let record = match log.read_at(offset) {
        Ok(record) => record,
        Err(e) => {
            return Ok(discarded(format!(
                "journaled delete of {id} at offset {offset}: {e}"
            )))
        }
    };

    if record.id().as_ref() != Some(id) {
        return Ok(discarded(format!(
            "frame at offset {offset} does not hold document {id}"
        )));
    }

    if record.tombstone {
        Ok(RecoveryOutcome::AlreadyApplied(MutationKind::Delete))
    } else {
        log.tombstone(offset)?;
        Ok(RecoveryOutcome::Replayed(MutationKind::Delete))
    }
}

fn discarded(reason: impl Into<String>) -> RecoveryOutcome {
    RecoveryOutcome::Discarded {
        reason: reason.into(),
    }
}
