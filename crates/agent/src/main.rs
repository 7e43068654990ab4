//! Health Agent - fleet health watchdog
//!
//! This binary runs next to the log and metrics collectors on each node,
//! tracks their workers through heartbeats and exposes a debounced health
//! verdict over HTTP.

use anyhow::{Context, Result};
use health_lib::{
    api::{self, AppState},
    health::HealthDebouncer,
    observability::{HealthMetrics, StructuredLogger},
    presenter::StatusPresenter,
    provider::DockerInfoCounter,
    reconciler::ReconcilerBuilder,
    routines::{categories, RoutineRegistry},
    vitals::VitalsTracker,
    HealthStatus,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting health-agent");

    // Load configuration
    let config = config::AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        docker_host = %config.docker_host,
        skip_stats = config.skip_stats,
        skip_logs = config.skip_logs,
        "Agent configured"
    );

    // Initialize metrics
    let metrics = HealthMetrics::new();
    metrics.set_status(HealthStatus::Starting);

    // Shared health state
    let registry = Arc::new(RoutineRegistry::new(categories::ALL));
    let vitals = Arc::new(VitalsTracker::new());
    let debouncer = HealthDebouncer::with_capacity(config.window_capacity);

    let counter = DockerInfoCounter::new(
        &config.docker_host,
        &config.docker_api_version,
        config.provider_timeout(),
    )
    .context("Failed to create workload counter")?;

    let mut builder = ReconcilerBuilder::new()
        .registry(registry.clone())
        .vitals(vitals.clone())
        .debouncer(debouncer.clone())
        .counter(Arc::new(counter))
        .interval(config.tick_interval())
        .node_name(config.node_name.clone());
    if config.skip_stats {
        builder = builder.skip_group("stats");
    }
    if config.skip_logs {
        builder = builder.skip_group("logs");
    }
    let reconciler = builder.build()?;

    // Initialize structured logger
    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(AGENT_VERSION, &config.bind_addr(), &config.health_path);

    let (heartbeat_tx, heartbeat_rx) = mpsc::channel(config.heartbeat_buffer);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // Start reconciliation loop
    let reconciler_handle = tokio::spawn(reconciler.run(heartbeat_rx, shutdown_rx));

    // Start health endpoint
    let presenter = StatusPresenter::new(registry, vitals, debouncer);
    let app_state = Arc::new(AppState::new(presenter, heartbeat_tx));
    let router = api::create_router(app_state, &config.health_path);
    let mut api_handle = tokio::spawn({
        let host = config.bind_host.clone();
        let port = config.bind_port;
        async move { api::serve(&host, port, router).await }
    });

    // Wait for shutdown signal or endpoint failure
    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
            Ok(())
        }
        served = &mut api_handle => {
            let reason = match served {
                Ok(Ok(())) => anyhow::anyhow!("health endpoint stopped unexpectedly"),
                Ok(Err(e)) => anyhow::Error::new(e),
                Err(e) => anyhow::Error::new(e).context("health endpoint task failed"),
            };
            error!(error = %reason, "Health endpoint failed");
            logger.log_shutdown("health endpoint failed");
            Err(reason)
        }
    };

    let _ = shutdown_tx.send(());
    api_handle.abort();
    if let Err(e) = reconciler_handle.await {
        error!(error = %e, "Reconciliation loop terminated abnormally");
    }
    info!("Shutting down");

    outcome
}
