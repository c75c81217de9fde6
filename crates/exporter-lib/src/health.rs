//! Health check infrastructure for the exporter
//!
//! Tracks the outcome of the most recent scrape per pipeline stage and
//! reports it to Kubernetes liveness and readiness probes.

use crate::collector::{ScrapeReport, ScrapeStage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// The stage succeeded in the last scrape (or has not run yet)
    Healthy,
    /// The stage failed in the last scrape; its data was omitted
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Degraded,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Degraded if any stage is degraded
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        if components
            .values()
            .any(|health| health.status == ComponentStatus::Degraded)
        {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const DEVICE_ENUMERATION: &str = "device_enumeration";
    pub const VERSION_PROBE: &str = "version_probe";
    pub const DEVICE_STATS: &str = "device_stats";

    pub const ALL: &[&str] = &[DEVICE_ENUMERATION, VERSION_PROBE, DEVICE_STATS];
}

/// Shared registry of stage health, cheap to clone
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components.write().await.insert(name.to_string(), health);
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Ready once startup has finished; stage faults do not affect readiness
    pub async fn readiness(&self) -> ReadinessResponse {
        if *self.ready.read().await {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        } else {
            ReadinessResponse {
                ready: false,
                reason: Some("Exporter not yet initialized".to_string()),
            }
        }
    }

    /// Update stage health from the outcome of a scrape
    pub async fn record_scrape(&self, report: &ScrapeReport) {
        let stages = [
            (components::VERSION_PROBE, ScrapeStage::Version),
            (components::DEVICE_ENUMERATION, ScrapeStage::Devices),
            (components::DEVICE_STATS, ScrapeStage::Stats),
        ];

        for (component, stage) in stages {
            // No device list means no stats were fetched this round
            if stage == ScrapeStage::Stats && report.devices.is_none() {
                continue;
            }

            let messages: Vec<String> = report
                .faults_in(stage)
                .map(|fault| match &fault.device {
                    Some(device) => format!("{device}: {}", fault.message),
                    None => fault.message.clone(),
                })
                .collect();

            let health = if messages.is_empty() {
                ComponentHealth::healthy()
            } else {
                ComponentHealth::degraded(messages.join("; "))
            };
            self.update(component, health).await;
        }
    }
}
