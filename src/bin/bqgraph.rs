//! bqgraph server
//!
//! Usage: `bqgraph [CONFIG]`. Without an argument `config.yaml` in the
//! working directory is used if present, built-in defaults otherwise.

use anyhow::{Context, Result};
use bqgraph::config::GatewayConfig;
use bqgraph::server::ServerBuilder;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config.yaml";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;

    // request serving and backend queries get separate thread budgets
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.event_threads)
        .max_blocking_threads(config.server.worker_threads)
        .thread_name("bqgraph")
        .enable_all()
        .build()
        .context("failed to build the tokio runtime")?;

    runtime.block_on(run(config))
}

fn load_config() -> Result<GatewayConfig> {
    let path = match std::env::args().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG);
            if !default.exists() {
                tracing::warn!("No {} found, using built-in defaults", DEFAULT_CONFIG);
                return Ok(GatewayConfig::default());
            }
            default
        }
    };

    let config = GatewayConfig::from_yaml_file(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

async fn run(config: GatewayConfig) -> Result<()> {
    tracing::info!(
        event_threads = config.server.event_threads,
        worker_threads = config.server.worker_threads,
        backend = ?config.backend.kind,
        "Starting bqgraph"
    );

    ServerBuilder::from_config(&config)?
        .serve(&config.server.bind)
        .await
}
