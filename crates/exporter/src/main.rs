//! ERDMA Exporter - Prometheus exporter for ERDMA adapter counters
//!
//! Runs as a DaemonSet on each Kubernetes node and serves the counters of
//! the node's ERDMA devices on every scrape.

use anyhow::{Context, Result};
use clap::Parser;
use exporter_lib::{
    api,
    collector::{resolve_node_name, ErdmaCollector, MetricCatalog, ProcessRunner, ToolCommands},
    health::{components, HealthRegistry},
    observability::{ExporterMetrics, StructuredLogger},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let cli = config::Cli::parse();
    let config = config::ExporterConfig::load(&cli)?;
    info!(
        listen_address = %config.listen_address,
        metrics_path = %config.metrics_path,
        timeout_secs = config.command_timeout_secs,
        "Exporter configured"
    );

    // A schema that does not register is the only fatal fault
    let catalog = MetricCatalog::new().context("failed to register ERDMA metric schema")?;
    info!(descriptors = catalog.descriptor_count(), "Registered ERDMA metric schema");

    let metrics = ExporterMetrics::new();
    metrics.set_build_info(EXPORTER_VERSION);

    let health_registry = HealthRegistry::new();
    for component in components::ALL {
        health_registry.register(component).await;
    }

    let runner = ProcessRunner::new(config.search_paths.clone(), config.command_timeout());
    for program in [&config.ibv_devices_command, &config.eadm_command] {
        info!(program = %program, path = %runner.resolve(program).display(), "Resolved tool");
    }

    let collector = ErdmaCollector::new(
        Arc::new(runner),
        Arc::new(catalog),
        ToolCommands {
            eadm: config.eadm_command.clone(),
            ibv_devices: config.ibv_devices_command.clone(),
        },
    );

    let logger = StructuredLogger::new(resolve_node_name());

    // Inventory scrape: diagnostics only, faults never stop startup
    let inventory = collector.scrape().await;
    logger.log_inventory(&inventory.report);
    health_registry.record_scrape(&inventory.report).await;

    let app_state = Arc::new(api::AppState::new(
        collector,
        health_registry.clone(),
        metrics,
        logger.clone(),
        config.metrics_path.clone(),
    ));

    health_registry.set_ready(true).await;
    logger.log_startup(EXPORTER_VERSION, &config.listen_address, &config.metrics_path);

    let shutdown_logger = logger.clone();
    api::serve(&config.listen_address, app_state, async move {
        let reason = shutdown_signal().await;
        shutdown_logger.log_shutdown(reason);
    })
    .await?;

    info!("Shutting down");
    Ok(())
}

/// Wait for SIGINT or SIGTERM, returning which one arrived
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT received",
        _ = terminate => "SIGTERM received",
    }
}
