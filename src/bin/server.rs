//! Fleet control plane process entry point.

use fleet_control_plane::{config, create_router, autoscaler, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting fleet control plane");

    let config = config::load()?;
    info!(
        registry = %config.registry_endpoint,
        cluster = %config.fargate_cluster_name,
        "configuration loaded"
    );

    let bind_address = config.bind_address.clone();
    let scaler_config = config.scaler.clone();
    let state = Arc::new(AppState::new(config).await?);

    let shutdown = state.shutdown.clone();
    let autoscaler_registry = Arc::clone(&state.registry);
    let autoscaler_orchestrator = Arc::clone(&state.orchestrator);
    let autoscaler_metrics = Arc::clone(&state.metrics);
    tokio::spawn(async move {
        autoscaler::run(
            autoscaler_registry,
            autoscaler_orchestrator,
            scaler_config,
            autoscaler_metrics,
            shutdown,
        )
        .await;
    });

    let app = create_router(Arc::clone(&state));

    info!(address = %bind_address, "listening");
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.shutdown.clone()))
        .await?;

    Ok(())
}

async fn shutdown_signal(shutdown: tokio_util::sync::CancellationToken) {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
    info!("shutdown signal received, draining in-flight requests");
    shutdown.cancel();
}
