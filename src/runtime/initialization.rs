//! # Initialization
//!
//! Controller start-up: rustls setup, tracing, metrics, the HTTP server, the
//! Kubernetes client, and the shared controller context.

use std::sync::Arc;

use anyhow::{Context, Result};
use kube::{api::Api, api::ListParams, Client, Resource};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{ControllerConfig, ServerConfig};
use crate::constants;
use crate::controller::server::{start_server, ServerState};
use crate::controller::ControllerContext;
use crate::crd::{IpRange, Network};
use crate::nuke::{Adapters, ConvergenceTracker};
use crate::observability;
use crate::rate::BackoffPolicies;
use crate::store::{Cluster, ClusterObject, KubeStore};

/// Everything the watch loops need
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Context shared by every reconcile call
    pub context: Arc<ControllerContext>,
    /// Server state for health checks
    pub server_state: ServerState,
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| constants::DEFAULT_LOG_FILTER.into()),
        )
        .try_init()
    {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Controller context setup
/// - Start-up summary of existing resources
///
/// `adapters` are the provider adapters of the cleanup controller; with none
/// registered that controller does not run.
pub async fn initialize(
    controller_config: &ControllerConfig,
    server_config: &ServerConfig,
    adapters: Adapters,
    shutdown: CancellationToken,
) -> Result<InitializationResult> {
    // Must run before anything opens a TLS connection
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    init_tracing();
    if !provider_installed {
        warn!("rustls crypto provider was already installed");
    }
    info!("Starting Cloud Manager Controller v{}", env!("CARGO_PKG_VERSION"));

    observability::metrics::register_metrics()?;

    let server_state = ServerState::default();
    let server_port = server_config.metrics_port;
    let server_handle = {
        let state = server_state.clone();
        tokio::spawn(async move {
            if let Err(e) = start_server(server_port, state).await {
                error!("HTTP server error: {:#}", e);
            }
        })
    };
    wait_for_server_ready(server_config, &server_state, &server_handle).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let store = KubeStore::new(client.clone(), controller_config.field_manager.clone());
    let cluster = Cluster::new(Arc::new(store));
    let policies = Arc::new(BackoffPolicies::from_config(controller_config));
    let context = Arc::new(ControllerContext::new(cluster, policies, shutdown).with_nuke(
        adapters,
        ConvergenceTracker::new(),
        controller_config.nuke_requeue(),
    ));

    log_existing::<Network>(&client).await;
    log_existing::<IpRange>(&client).await;

    info!("Controller initialized, starting watch loops...");

    Ok(InitializationResult {
        client,
        context,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    config: &ServerConfig,
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = std::time::Duration::from_secs(config.startup_timeout_secs);
    let poll_interval = std::time::Duration::from_millis(config.poll_interval_ms);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Log how many objects of kind `K` exist before the watch starts
///
/// A kind whose CRD is not installed is reported and skipped; its watch loop will
/// keep retrying on its own.
async fn log_existing<K>(client: &Client)
where
    K: ClusterObject,
{
    let kind = K::kind(&()).into_owned();
    let api: Api<K> = Api::all(client.clone());
    match api.list(&ListParams::default()).await {
        Ok(list) => {
            let mut namespaces: Vec<&str> = list
                .items
                .iter()
                .filter_map(|item| item.meta().namespace.as_deref())
                .collect();
            namespaces.sort_unstable();
            namespaces.dedup();
            info!(
                kind = %kind,
                total = list.items.len(),
                namespaces = namespaces.len(),
                "Existing resources found"
            );
        }
        Err(e) => {
            warn!(kind = %kind, error = %e, "CRD is not queryable yet, is it installed?");
        }
    }
}
