//! Verify command implementation.

use super::{open_catalog, target_collections};
use crate::error::CliResult;
use orbital_core::{Config, RecoveryOutcome, VerifyReport};
use std::path::Path;

/// Verifies the selected collections.
///
/// Opening a collection runs journal recovery and rewrites the index
/// mirror, so this is not a read-only check. The recovery outcome is
/// returned alongside each report.
pub fn verify(
    path: &Path,
    collection: Option<&str>,
) -> CliResult<Vec<(VerifyReport, RecoveryOutcome)>> {
    let catalog = open_catalog(path, Config::default())?;

    let mut reports = Vec::new();
    for name in target_collections(&catalog, collection)? {
        let handle = catalog.collection(&name)?;
        let collection = handle.lock();
        reports.push((collection.verify()?, collection.last_recovery().clone()));
    }
    Ok(reports)
}

/// Runs the verify command. Returns `true` if every collection is
/// consistent.
pub fn run(path: &Path, collection: Option<&str>) -> CliResult<bool> {
    println!("Verifying database at {}", path.display());
    println!();

    let reports = verify(path, collection)?;
    let mut consistent = true;

    for (report, recovery) in &reports {
        println!("Collection {}", report.name);
        if !recovery.is_clean() {
            println!("  Recovery:      {recovery:?}");
        }
        println!("  Frames:        {}", report.frames);
        println!("  Live frames:   {}", report.live_frames);
        println!("  Tombstones:    {}", report.tombstones);
        println!("  Superseded:    {}", report.superseded);
        println!("  Indexed:       {}", report.indexed);
        println!("  Log size:      {} bytes", report.log_bytes);

        if report.is_consistent() {
            println!("  Status:        OK");
        } else {
            consistent = false;
            println!("  Status:        {} issue(s)", report.issues.len());
            for issue in &report.issues {
                println!("    - {issue}");
            }
        }
        println!();
    }

    if consistent {
        println!("All {} collection(s) consistent.", reports.len());
    }
    Ok(consistent)
}
