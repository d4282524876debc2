//! Work item filter CLI
//!
//! Runs filter expressions against a JSON dataset. Results and errors are
//! printed as JSON on stdout so the tool can be scripted; diagnostics go to
//! stderr.

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;
use witrack::cli::{Cli, Commands};
use witrack::filter::{parse_filter, SearchRequest, WorkItemFilter};
use witrack::output::{response_schema, ErrorDocument, ExitCode, LinkTarget, SearchResponse};
use witrack::{InMemoryStorage, QueryError, WitrackConfig};

/// The error a command ends with, and how the process exits
struct Failure {
    error: QueryError,
    exit_code: ExitCode,
}

impl From<QueryError> for Failure {
    fn from(error: QueryError) -> Self {
        Self {
            exit_code: ExitCode::for_error(&error),
            error,
        }
    }
}

impl Failure {
    /// Dataset, config or stdout trouble
    fn external(error: anyhow::Error) -> Self {
        Self {
            error: QueryError::Internal(error),
            exit_code: ExitCode::ExternalError,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let exit_code = match run(&cli) {
        Ok(()) => ExitCode::Success,
        Err(failure) => report(&failure, cli.quiet),
    };

    if exit_code != ExitCode::Success {
        std::process::exit(exit_code.code());
    }
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "error" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: &Cli) -> Result<(), Failure> {
    let config = WitrackConfig::load(&cli.config).map_err(Failure::external)?;

    match &cli.command {
        Commands::Query {
            data,
            filter,
            space,
            offset,
            limit,
        } => {
            let storage = InMemoryStorage::load(data).map_err(Failure::external)?;
            let engine = WorkItemFilter::new(storage, &config);
            let request = SearchRequest {
                expression: filter.clone(),
                space_id: space.clone(),
                offset: *offset,
                limit: *limit,
            };
            let result = engine.search(&request)?;

            let base_url = config.server().base_url();
            let target = LinkTarget {
                base_url: &base_url,
                expression: &request.expression,
                space_id: request.space_id.as_deref(),
            };
            print_json(&SearchResponse::new(result, &target))
        }
        Commands::Check {
            filter,
            data,
            space,
        } => {
            let document = parse_filter(filter.as_bytes())?;
            let warnings = match data {
                Some(data) => {
                    let storage = InMemoryStorage::load(data).map_err(Failure::external)?;
                    WorkItemFilter::new(storage, &config).check(&document, space.as_deref())?
                }
                None => Vec::new(),
            };
            print_json(&json!({
                "valid": true,
                "tree_view": document.options.tree_view,
                "warnings": warnings,
            }))
        }
        Commands::Schema => print_json(&response_schema()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Failure> {
    let text = serde_json::to_string_pretty(value)
        .context("Failed to serialize output")
        .map_err(Failure::external)?;
    println!("{}", text);
    Ok(())
}

/// Print the error document and pick the exit code
fn report(failure: &Failure, quiet: bool) -> ExitCode {
    let document = ErrorDocument::from_error(&failure.error);

    if failure.error.is_client_error() {
        debug!(error_id = %document.id(), code = failure.error.code(), "filter rejected: {}", failure.error);
    } else {
        error!(error_id = %document.id(), "command failed: {:?}", failure.error);
    }

    match document.to_json_string() {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: failed to serialize error document: {}", e),
    }
    if !quiet {
        eprintln!("{}", failure.error.to_actionable());
    }

    failure.exit_code
}
