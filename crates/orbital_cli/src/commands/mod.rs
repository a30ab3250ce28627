//! CLI command implementations.

pub mod compact;
pub mod documents;
pub mod inspect;
pub mod verify;

use crate::error::{CliError, CliResult};
use clap::ValueEnum;
use orbital_core::{Catalog, Config};
use std::path::Path;

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Opens an existing database directory.
pub(crate) fn open_catalog(path: &Path, config: Config) -> CliResult<Catalog> {
    if !path.is_dir() {
        return Err(CliError::NoDatabase {
            path: path.display().to_string(),
        });
    }
    Ok(Catalog::open(path, config.create_if_missing(false))?)
}

/// Resolves the collections a command applies to: the one named, or every
/// collection on disk.
pub(crate) fn target_collections(catalog: &Catalog, name: Option<&str>) -> CliResult<Vec<String>> {
    let existing = catalog.discover()?;
    match name {
        Some(name) if existing.iter().any(|n| n == name) => Ok(vec![name.to_string()]),
        Some(name) => Err(CliError::UnknownCollection {
            name: name.to_string(),
        }),
        None => Ok(existing),
    }
}
