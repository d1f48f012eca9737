//! sku-feeder: a one-line-per-connection SKU ingest server
//!
//! Clients connect over TCP and send a single product SKU line each.
//! Features:
//! - Bounded number of concurrently handled connections
//! - SKU validation and duplicate detection
//! - Graceful stop on `terminate`, OS signals or the run deadline
//! - Final created/duplicate/discarded report appended to a file
//! - Configuration via CLI arguments, environment or TOML file

mod config;
mod error;
mod server;
mod shutdown;
mod sku;

use config::Config;
use server::{FileReportSink, Server, TcpSkuReader};
use sku::{CreateSkuHandler, InMemorySkuRepository};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        max_connections = config.max_connections,
        timeout_secs = config.timeout.as_secs(),
        report_file = %config.report_file.display(),
        "Starting sku-feeder server"
    );
    if config.max_connections == 0 {
        warn!("Connection ceiling is 0, no connections will be accepted");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

/// Wire up collaborators and run until the server stops.
async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // The time budget starts before the listener is bound.
    let deadline = config.deadline(tokio::time::Instant::now());

    let reader = TcpSkuReader::bind(&config.listen, config.backlog)?;
    info!(address = %reader.local_addr(), "Listening for sku connections");

    let repository = Arc::new(InMemorySkuRepository::new(config.max_skus));
    let handler = Arc::new(CreateSkuHandler::new(repository));
    let sink = Arc::new(FileReportSink::new(&config.report_file));

    let summary = Server::new(Arc::new(reader), handler, sink)
        .with_os_signals(true)
        .run(config.max_connections, deadline, CancellationToken::new())
        .await;

    info!(%summary, "Server finished successfully");
    Ok(())
}
