//! Inspect command implementation.

use super::{open_catalog, target_collections, OutputFormat};
use crate::error::CliResult;
use orbital_core::{CollectionStats, Config};
use serde::Serialize;
use std::path::Path;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database path.
    pub path: String,
    /// Total size of all logs in bytes.
    pub total_log_bytes: u64,
    /// Per-collection statistics.
    pub collections: Vec<CollectionStats>,
}

/// Collects statistics for the selected collections.
///
/// Each collection is opened normally, so a pending journal entry is
/// resolved first.
pub fn inspect(path: &Path, collection: Option<&str>) -> CliResult<InspectResult> {
    let catalog = open_catalog(path, Config::default())?;

    let mut collections = Vec::new();
    for name in target_collections(&catalog, collection)? {
        let handle = catalog.collection(&name)?;
        let stats = handle.lock().stats()?;
        collections.push(stats);
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        total_log_bytes: collections.iter().map(|c| c.log_bytes).sum(),
        collections,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, collection: Option<&str>, format: OutputFormat) -> CliResult<()> {
    let result = inspect(path, collection)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text(&result),
    }
    Ok(())
}

fn print_text(result: &InspectResult) {
    println!("Database: {}", result.path);
    println!("Total log size: {} bytes", result.total_log_bytes);
    println!();

    if result.collections.is_empty() {
        println!("No collections.");
        return;
    }

    for stats in &result.collections {
        println!("Collection {}", stats.name);
        println!("  Documents: {}", stats.count);
        println!("  Log size:  {} bytes", stats.log_bytes);
        let ids: Vec<String> = stats.ids.iter().map(ToString::to_string).collect();
        println!("  Ids:       [{}]", ids.join(", "));
    }
}
