//! Compact command implementation.

use super::{open_catalog, target_collections};
use crate::error::CliResult;
use orbital_core::{CollectionOptions, CompactionPolicy, CompactionStats, Config};
use std::path::Path;

/// What happened to one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactOutcome {
    /// The log was at or below the threshold.
    BelowThreshold {
        /// Current log size.
        log_bytes: u64,
    },
    /// The log would have been compacted (dry run).
    WouldCompact {
        /// Current log size.
        log_bytes: u64,
        /// Live documents that would be kept.
        live_records: usize,
    },
    /// The log was compacted.
    Compacted(CompactionStats),
}

/// Compacts every selected collection whose log exceeds `threshold_kb`.
pub fn compact(
    path: &Path,
    collection: Option<&str>,
    threshold_kb: u64,
    dry_run: bool,
) -> CliResult<Vec<(String, CompactOutcome)>> {
    let catalog = open_catalog(path, Config::default())?;
    let policy = CompactionPolicy::with_min_log_bytes(threshold_kb.saturating_mul(1024));

    let mut outcomes = Vec::new();
    for name in target_collections(&catalog, collection)? {
        let options = CollectionOptions::new().with_compaction_policy(policy);
        let handle = catalog.collection_with(&name, options)?;
        let mut collection = handle.lock();

        let log_bytes = collection.log_size()?;
        let outcome = if !collection.needs_compaction()? {
            CompactOutcome::BelowThreshold { log_bytes }
        } else if dry_run {
            CompactOutcome::WouldCompact {
                log_bytes,
                live_records: collection.len(),
            }
        } else {
            CompactOutcome::Compacted(collection.compact()?)
        };
        outcomes.push((name, outcome));
    }
    Ok(outcomes)
}

/// Runs the compact command.
pub fn run(path: &Path, collection: Option<&str>, threshold_kb: u64, dry_run: bool) -> CliResult<()> {
    println!("Compacting logs at {} (threshold {threshold_kb} KiB)", path.display());
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    for (name, outcome) in compact(path, collection, threshold_kb, dry_run)? {
        match outcome {
            CompactOutcome::BelowThreshold { log_bytes } => {
                println!("{name}: {log_bytes} bytes, below threshold, skipped");
            }
            CompactOutcome::WouldCompact {
                log_bytes,
                live_records,
            } => {
                println!("{name}: {log_bytes} bytes, would keep {live_records} document(s)");
            }
            CompactOutcome::Compacted(stats) => {
                let percent = if stats.bytes_before > 0 {
                    stats.bytes_reclaimed() as f64 / stats.bytes_before as f64 * 100.0
                } else {
                    0.0
                };
                println!(
                    "{name}: {} -> {} bytes, {} document(s) kept, {:.1}% reclaimed",
                    stats.bytes_before, stats.bytes_after, stats.live_records, percent
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbital_core::{Catalog, DocumentId};
    use serde_json::json;
    use tempfile::tempdir;

    fn seed(path: &Path) {
        let catalog = Catalog::open(path, Config::default().sync_writes(false)).unwrap();
        let users = catalog.collection("users").unwrap();
        let mut users = users.lock();
        for i in 0..50 {
            users
                .insert_value(json!({ "id": i, "bio": "x".repeat(40) }))
                .unwrap();
        }
        for i in 0..40 {
            users.delete(&DocumentId::Int(i)).unwrap();
        }
    }

    #[test]
    fn threshold_is_respected() {
        let dir = tempdir().unwrap();
        seed(dir.path());

        let outcomes = compact(dir.path(), None, 500, false).unwrap();
        assert!(matches!(
            outcomes[0].1,
            CompactOutcome::BelowThreshold { .. }
        ));
    }

    #[test]
    fn dry_run_changes_nothing() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        let before = std::fs::read(dir.path().join("users.db")).unwrap();

        let outcomes = compact(dir.path(), Some("users"), 0, true).unwrap();
        assert_eq!(
            outcomes[0].1,
            CompactOutcome::WouldCompact {
                log_bytes: before.len() as u64,
                live_records: 10
            }
        );
        assert_eq!(std::fs::read(dir.path().join("users.db")).unwrap(), before);
    }

    #[test]
    fn compaction_shrinks_log() {
        let dir = tempdir().unwrap();
        seed(dir.path());

        let outcomes = compact(dir.path(), Some("users"), 0, false).unwrap();
        let CompactOutcome::Compacted(stats) = &outcomes[0].1 else {
            panic!("expected compaction, got {:?}", outcomes[0].1);
        };
        assert_eq!(stats.live_records, 10);
        assert!(stats.bytes_after < stats.bytes_before);
    }
}
