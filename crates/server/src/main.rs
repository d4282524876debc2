//! Work Item Search REST API Server
//!
//! Serves the work item filter over HTTP for a dataset loaded at startup.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use witrack::filter::WorkItemFilter;
use witrack::storage::InMemoryStorage;
use witrack::WitrackConfig;
use witrack_server::build_app;

/// REST API server for work item search
#[derive(Parser)]
#[command(name = "witrack-server", version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(long, env = "WITRACK_CONFIG", default_value = "witrack.toml")]
    config: PathBuf,

    /// Listen address (overrides [server] bind)
    #[arg(long, env = "WITRACK_BIND")]
    bind: Option<String>,

    /// Dataset file to serve (overrides [server] data)
    #[arg(long, env = "WITRACK_DATA")]
    data: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    info!("Starting witrack API server...");

    let config = WitrackConfig::load(&args.config)?;
    let server = config.server();

    let data = args.data.unwrap_or_else(|| PathBuf::from(server.data()));
    let storage = InMemoryStorage::load(&data).with_context(|| {
        format!(
            "Failed to load dataset {}\n\n\
             The server needs a JSON dataset. Pass --data or set WITRACK_DATA.",
            data.display()
        )
    })?;
    info!("Serving dataset {}", data.display());

    let app = build_app(WorkItemFilter::new(storage, &config), &server.base_url());

    let addr = args.bind.unwrap_or_else(|| server.bind());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
