//! Command-line interface definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Work item filter tool
///
/// Runs JSON filter expressions against a work item dataset and prints the
/// result envelope, or a single error document, as JSON.
///
/// Exit Codes:
///   0  - Command succeeded
///   1  - Query failed inside the engine or store
///   2  - The filter or its arguments were rejected
///  10  - Dataset or config could not be read
#[derive(Parser)]
#[command(name = "witrack")]
#[command(about = "Work item filter compiler", long_about = None)]
pub struct Cli {
    /// Suppress diagnostics on stderr (for scripting)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file
    #[arg(long, global = true, default_value = "witrack.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a filter against a dataset
    ///
    /// Example:
    ///   witrack query --data data.json --filter '{"state": {"$NE": "closed"}}'
    Query {
        /// Dataset file (JSON)
        #[arg(long)]
        data: PathBuf,

        /// Filter expression (JSON)
        #[arg(long)]
        filter: String,

        /// Restrict the search to one space
        #[arg(long)]
        space: Option<String>,

        /// Index of the first result
        #[arg(long)]
        offset: Option<usize>,

        /// Page size (clamped to the configured maximum)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Validate a filter expression
    ///
    /// Without --data only the syntax is checked. With --data, keys and
    /// values are resolved against the dataset as well.
    Check {
        /// Filter expression (JSON)
        #[arg(long)]
        filter: String,

        /// Dataset used to resolve keys
        #[arg(long)]
        data: Option<PathBuf>,

        /// Space used to resolve type group keys
        #[arg(long)]
        space: Option<String>,
    },

    /// Print the JSON schema of the search response
    Schema,
}
