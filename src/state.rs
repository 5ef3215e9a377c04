//! Application state shared across all handlers.

use crate::config::Config;
use crate::metrics::Metrics;
use crate::orchestrator::ecs::EcsOrchestrator;
use crate::orchestrator::Orchestrator;
use crate::registry::{Registry, RegistryClient};
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shared application state, constructed once at startup and handed to
/// every handler behind an `Arc`.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<dyn Registry>,
    pub orchestrator: Arc<dyn Orchestrator>,
    pub metrics: Arc<Metrics>,
    pub start_time: Instant,
    pub request_count: AtomicU64,
    /// Flips true once the registry connection has been established; the
    /// autoscaler does not gate readiness, only startup does.
    pub ready: AtomicBool,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, crate::Error> {
        let registry: Arc<dyn Registry> =
            Arc::new(RegistryClient::connect(&config.registry_endpoint).await?);
        let orchestrator: Arc<dyn Orchestrator> = Arc::new(EcsOrchestrator::connect(&config).await);

        info!(
            registry = %config.registry_endpoint,
            cluster = %config.fargate_cluster_name,
            "control plane state initialized"
        );

        Ok(Self {
            config,
            registry,
            orchestrator,
            metrics: Arc::new(Metrics::new()),
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            ready: AtomicBool::new(true),
            shutdown: CancellationToken::new(),
        })
    }
}
