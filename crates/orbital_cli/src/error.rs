//! CLI error type.

use orbital_core::CoreError;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// `--path` was not given.
    #[error("database path required for {command} (use --path)")]
    MissingPath {
        /// The command that needs it.
        command: &'static str,
    },

    /// The database directory does not exist.
    #[error("no database found at {path}")]
    NoDatabase {
        /// The path that was given.
        path: String,
    },

    /// The named collection has no log file.
    #[error("collection {name:?} does not exist")]
    UnknownCollection {
        /// The name that was given.
        name: String,
    },

    /// A command-line argument is not valid JSON.
    #[error("invalid JSON argument: {0}")]
    Json(#[from] serde_json::Error),

    /// Engine error.
    #[error(transparent)]
    Core(#[from] CoreError),
}
