//! # Cloud Manager Controller
//!
//! A Kubernetes controller that reconciles cloud infrastructure objects through
//! composable action pipelines.
//!
//! ## Overview
//!
//! The binary runs:
//!
//! 1. **Network controller** - waits for the Network's Subscription to be Ready, then marks it Ready
//! 2. **IpRange controller** - waits for the Network and its Subscription, then marks it Ready
//! 3. **HTTP server** - Prometheus metrics plus liveness and readiness endpoints
//!
//! ## Configuration
//!
//! Environment variables (`METRICS_PORT`, `FIELD_MANAGER`, `NUKE_REQUEUE_SECS`,
//! `BACKOFF_<TIER>_BASE_MS`, `BACKOFF_<TIER>_MAX_MS`, `BACKOFF_<TIER>_SPEED`) with
//! defaults; `--metrics-port` overrides the environment.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cloud_manager::config::load_config;
use cloud_manager::runtime::{initialize, run_watch_loops};

#[derive(Parser, Debug)]
#[command(name = "cloud-manager-controller")]
#[command(about = "Reconciles cloud infrastructure custom resources", long_about = None)]
#[command(version)]
struct Cli {
    /// Port of the metrics and health server (overrides METRICS_PORT)
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (controller_config, mut server_config) = load_config();
    if let Some(port) = cli.metrics_port {
        server_config.metrics_port = port;
    }

    let shutdown = CancellationToken::new();
    let init_result = initialize(&controller_config, &server_config, Arc::new([]), shutdown.clone()).await?;

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping controllers"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        signal_token.cancel();
    });

    run_watch_loops(init_result.client, init_result.context).await;
    init_result.server_state.set_ready(false);

    info!("Controller stopped");
    Ok(())
}
