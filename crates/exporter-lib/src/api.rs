//! HTTP API: Prometheus metrics, health checks and the index page

use crate::collector::ErdmaCollector;
use crate::health::HealthRegistry;
use crate::observability::{ExporterMetrics, StructuredLogger};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
pub struct AppState {
    pub collector: ErdmaCollector,
    pub health_registry: HealthRegistry,
    pub metrics: ExporterMetrics,
    pub logger: StructuredLogger,
    pub metrics_path: String,
}

impl AppState {
    pub fn new(
        collector: ErdmaCollector,
        health_registry: HealthRegistry,
        metrics: ExporterMetrics,
        logger: StructuredLogger,
        metrics_path: impl Into<String>,
    ) -> Self {
        Self {
            collector,
            health_registry,
            metrics,
            logger,
            metrics_path: metrics_path.into(),
        }
    }
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>ERDMA Exporter</title></head>\n\
         <body>\n\
         <h1>ERDMA Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        path = state.metrics_path
    ))
}

/// Health check response - 200 while serving, body lists degraded stages
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.health_registry.health().await))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
///
/// Runs a fresh scrape on every request and merges it with the exporter's
/// own metrics from the default registry.
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let scrape = state.collector.scrape().await;

    state.health_registry.record_scrape(&scrape.report).await;
    state.metrics.observe_scrape(&scrape.report);
    state.logger.log_scrape(&scrape.report);

    let mut families = prometheus::gather();
    families.extend(scrape.families);
    families.sort_by(|a, b| a.get_name().cmp(b.get_name()));

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {e}"),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// Paths served by fixed routes; the metrics path must not collide with them
pub const RESERVED_PATHS: &[&str] = &["/", "/healthz", "/readyz"];

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let metrics_path = state.metrics_path.clone();

    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(&metrics_path, get(metrics))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn serve(
    listen_address: &str,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %listen_address, "Starting API server");

    let listener = tokio::net::TcpListener::bind(listen_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
