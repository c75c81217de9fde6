//! Integration tests for the exporter HTTP endpoints

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use exporter_lib::{
    api::{create_router, AppState},
    collector::{CommandError, CommandRunner, ErdmaCollector, MetricCatalog, ToolCommands},
    health::{components, HealthRegistry},
    observability::{ExporterMetrics, StructuredLogger},
};
use std::sync::Arc;
use tower::ServiceExt;

/// Stand-in for the ERDMA tools; `erdma_1` stats always fail
struct FakeTools {
    devices_available: bool,
}

#[async_trait]
impl CommandRunner for FakeTools {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, CommandError> {
        let stdout = match (program, args) {
            ("eadm", ["ver"]) => "Query kernel driver version: 0.2.38\n",
            ("ibv_devices", []) if self.devices_available => {
                "    device                 node GUID\n    ------              ----------------\n    erdma_0             02163efffe5030b3\n    erdma_1             02163efffe5030b4\n"
            }
            ("eadm", ["stat", "-d", "erdma_0"]) => {
                "listen_create_cnt : 5\nhw_rx_packets_cnt : 1200\ngarbage line\n"
            }
            _ => {
                return Err(CommandError::Exit {
                    program: program.to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "No such device".to_string(),
                })
            }
        };
        Ok(stdout.as_bytes().to_vec())
    }
}

async fn setup_test_app(devices_available: bool) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    for component in components::ALL {
        health_registry.register(component).await;
    }

    let collector = ErdmaCollector::new(
        Arc::new(FakeTools { devices_available }),
        Arc::new(MetricCatalog::new().unwrap()),
        ToolCommands::default(),
    );
    let state = Arc::new(AppState::new(
        collector,
        health_registry,
        ExporterMetrics::new(),
        StructuredLogger::new("test-node"),
        "/metrics",
    ));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn sample_lines<'a>(body: &'a str, name: &str) -> Vec<&'a str> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| line.split(['{', ' ']).next() == Some(name))
        .collect()
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_erdma_metrics() {
    let (app, _state) = setup_test_app(true).await;

    let (status, body) = get(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);

    assert!(body.contains("# TYPE erdma_driver_version gauge"));
    assert!(body.contains("# TYPE erdma_listen_create_total counter"));
    assert!(body.contains("# HELP erdma_hw_rx_packets_total Total number of hardware receive packets"));

    let version = sample_lines(&body, "erdma_driver_version");
    assert_eq!(version.len(), 1);
    assert!(version[0].contains("version=\"0.2.38\""));
    assert!(version[0].ends_with(" 1"));

    // identity for both devices, counters only for the one whose stats worked
    assert_eq!(sample_lines(&body, "erdma_device_info").len(), 2);
    let listen = sample_lines(&body, "erdma_listen_create_total");
    assert_eq!(listen.len(), 1);
    assert!(listen[0].contains("device=\"erdma_0\""));
    assert!(listen[0].ends_with(" 5"));

    // self-metrics share the page
    assert!(body.contains("erdma_exporter_scrapes_total"));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_metrics_endpoint_exposes_process_metrics() {
    let (app, _state) = setup_test_app(true).await;

    let (status, body) = get(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body
        .lines()
        .any(|line| line.starts_with("process_")));
}

#[tokio::test]
async fn test_metrics_endpoint_survives_enumeration_failure() {
    let (app, state) = setup_test_app(false).await;

    let (status, body) = get(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sample_lines(&body, "erdma_driver_version").len(), 1);
    assert!(sample_lines(&body, "erdma_device_info").is_empty());

    let health = state.health_registry.health().await;
    assert_eq!(
        health.components[components::DEVICE_ENUMERATION].status,
        exporter_lib::ComponentStatus::Degraded
    );
}

#[tokio::test]
async fn test_scrape_updates_stage_health() {
    let (app, _state) = setup_test_app(true).await;
    get(app.clone(), "/metrics").await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["device_stats"]["status"], "degraded");
    assert_eq!(health["components"]["version_probe"]["status"], "healthy");
    assert!(health["components"]["device_stats"]["message"]
        .as_str()
        .unwrap()
        .starts_with("erdma_1: "));
}

#[tokio::test]
async fn test_readyz_returns_503_until_ready() {
    let (app, state) = setup_test_app(true).await;

    let (status, _) = get(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    state.health_registry.set_ready(true).await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_index_links_metrics_path() {
    let (app, _state) = setup_test_app(true).await;

    let (status, body) = get(app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<title>ERDMA Exporter</title>"));
    assert!(body.contains("href=\"/metrics\""));
}

#[tokio::test]
async fn test_unknown_path_returns_404() {
    let (app, _state) = setup_test_app(true).await;
    let (status, _) = get(app, "/nonexistent").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
