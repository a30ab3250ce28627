//! OrbitalDB CLI
//!
//! Command-line tools for OrbitalDB database directories.
//!
//! # Commands
//!
//! - `inspect` - Show live document counts, ids and log sizes
//! - `verify` - Check every log frame against the index
//! - `compact` - Compact logs that exceed a size threshold
//! - `insert`, `get`, `delete` - Single-document operations
//! - `version` - Show version information
//!
//! Every command opens collections through the engine, so even `inspect`
//! and `verify` run journal recovery and refresh the index mirror.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use error::{CliError, CliResult};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// OrbitalDB command-line database tools.
#[derive(Parser)]
#[command(name = "orbitaldb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show live document counts, ids and log sizes
    ///
    /// Opening a collection takes the database LOCK, resolves a pending
    /// journal entry and rewrites the index mirror. It may change files on
    /// disk; the document set it reports is what recovery left.
    Inspect {
        /// Only this collection (default: every collection on disk)
        #[arg(short, long)]
        collection: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Scan every log frame and check it against the index
    ///
    /// Opening a collection takes the database LOCK, resolves a pending
    /// journal entry and rewrites the index mirror. It may change files on
    /// disk; the document set it reports is what recovery left.
    Verify {
        /// Only this collection (default: every collection on disk)
        #[arg(short, long)]
        collection: Option<String>,
    },

    /// Compact logs larger than a threshold
    Compact {
        /// Only this collection (default: every collection on disk)
        #[arg(short, long)]
        collection: Option<String>,

        /// Size in KiB a log must exceed to be compacted
        #[arg(short, long, default_value_t = 500)]
        threshold_kb: u64,

        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Insert a JSON document
    Insert {
        /// Target collection
        #[arg(short, long)]
        collection: String,

        /// Document as JSON, e.g. '{"id": 1, "name": "ada"}'
        document: String,

        /// Generate a UUID id for documents without one
        #[arg(long)]
        assign_id: bool,
    },

    /// Look up one document by id or by an indexed field
    Get {
        /// Target collection
        #[arg(short, long)]
        collection: String,

        /// Query as JSON: an id (`1`, `"k"`) or a one-field object
        query: String,

        /// Build a secondary index on this field before querying
        #[arg(short, long)]
        index: Vec<String>,
    },

    /// Delete a document by id
    Delete {
        /// Target collection
        #[arg(short, long)]
        collection: String,

        /// Id as JSON, e.g. `1` or `"k"`
        id: String,
    },

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<ExitCode> {
    let path = cli.path;
    let require_path = |command: &'static str| path.clone().ok_or(CliError::MissingPath { command });

    match cli.command {
        Commands::Inspect { collection, format } => {
            commands::inspect::run(&require_path("inspect")?, collection.as_deref(), format)?;
        }
        Commands::Verify { collection } => {
            let consistent = commands::verify::run(&require_path("verify")?, collection.as_deref())?;
            if !consistent {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Compact {
            collection,
            threshold_kb,
            dry_run,
        } => {
            commands::compact::run(
                &require_path("compact")?,
                collection.as_deref(),
                threshold_kb,
                dry_run,
            )?;
        }
        Commands::Insert {
            collection,
            document,
            assign_id,
        } => {
            commands::documents::insert(&require_path("insert")?, &collection, &document, assign_id)?;
        }
        Commands::Get {
            collection,
            query,
            index,
        } => {
            let found = commands::documents::get(&require_path("get")?, &collection, &query, &index)?;
            if !found {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Delete { collection, id } => {
            commands::documents::delete(&require_path("delete")?, &collection, &id)?;
        }
        Commands::Version => {
            println!("OrbitalDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("OrbitalDB Core v{}", orbital_core::VERSION);
        }
    }

    Ok(ExitCode::SUCCESS)
}
