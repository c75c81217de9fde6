//! Observability infrastructure for the exporter
//!
//! Provides:
//! - Prometheus self-metrics (scrape latency, command failures, device count)
//! - Standard `process_*` metrics for the exporter process (Linux)
//! - Structured JSON logging with tracing

use crate::collector::{ScrapeReport, ScrapeStage};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for scrape duration (in seconds); every scrape forks processes
const SCRAPE_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ExporterMetricsInner> = OnceLock::new();

struct ExporterMetricsInner {
    scrape_duration_seconds: Histogram,
    scrapes_total: IntCounter,
    command_failures_total: IntCounterVec,
    devices: IntGauge,
    build_info: GaugeVec,
}

impl ExporterMetricsInner {
    fn new() -> Self {
        #[cfg(target_os = "linux")]
        prometheus::register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))
        .expect("Failed to register process collector");

        Self {
            scrape_duration_seconds: register_histogram!(
                "erdma_exporter_scrape_duration_seconds",
                "Time spent collecting ERDMA metrics for one scrape",
                SCRAPE_BUCKETS.to_vec()
            )
            .expect("Failed to register scrape_duration_seconds"),

            scrapes_total: register_int_counter!(
                "erdma_exporter_scrapes_total",
                "Total number of scrapes served"
            )
            .expect("Failed to register scrapes_total"),

            command_failures_total: register_int_counter_vec!(
                "erdma_exporter_command_failures_total",
                "Total number of failed external command invocations by scrape stage",
                &["stage"]
            )
            .expect("Failed to register command_failures_total"),

            devices: register_int_gauge!(
                "erdma_exporter_devices",
                "Number of ERDMA devices found by the last successful enumeration"
            )
            .expect("Failed to register devices"),

            build_info: register_gauge_vec!(
                "erdma_exporter_build_info",
                "Exporter build information",
                &["version"]
            )
            .expect("Failed to register build_info"),
        }
    }
}

/// Exporter self-metrics
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ExporterMetrics {
    _private: (),
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterMetrics {
    /// Create a new metrics handle (registers global metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ExporterMetricsInner {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new)
    }

    pub fn set_build_info(&self, version: &str) {
        self.inner().build_info.reset();
        self.inner()
            .build_info
            .with_label_values(&[version])
            .set(1.0);
    }

    /// Account for a finished scrape
    pub fn observe_scrape(&self, report: &ScrapeReport) {
        let inner = self.inner();
        inner.scrapes_total.inc();
        inner
            .scrape_duration_seconds
            .observe(report.elapsed.as_secs_f64());

        for fault in &report.faults {
            inner
                .command_failures_total
                .with_label_values(&[fault.stage.as_str()])
                .inc();
        }

        if let Some(count) = report.device_count() {
            inner.devices.set(count as i64);
        }
    }

    #[cfg(test)]
    pub(crate) fn command_failures(&self, stage: ScrapeStage) -> u64 {
        self.inner()
            .command_failures_total
            .with_label_values(&[stage.as_str()])
            .get()
    }

    #[cfg(test)]
    pub(crate) fn scrapes(&self) -> u64 {
        self.inner().scrapes_total.get()
    }
}

/// Structured logger for exporter events
///
/// Every record carries the node it was produced on.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, listen_address: &str, metrics_path: &str) {
        info!(
            event = "exporter_started",
            node = %self.node_name,
            exporter_version = %version,
            listen_address = %listen_address,
            metrics_path = %metrics_path,
            "ERDMA exporter started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "exporter_shutdown",
            node = %self.node_name,
            reason = %reason,
            "ERDMA exporter shutting down"
        );
    }

    /// Log what the first scrape found, device by device
    pub fn log_inventory(&self, report: &ScrapeReport) {
        match &report.version {
            Some(version) => info!(
                event = "startup_inventory",
                node = %self.node_name,
                driver_version = %version,
                "ERDMA driver detected"
            ),
            None => {
                for fault in report.faults_in(ScrapeStage::Version) {
                    warn!(
                        event = "startup_inventory",
                        node = %self.node_name,
                        error = %fault.message,
                        "ERDMA driver version unavailable"
                    );
                }
            }
        }

        let Some(devices) = &report.devices else {
            for fault in report.faults_in(ScrapeStage::Devices) {
                warn!(
                    event = "startup_inventory",
                    node = %self.node_name,
                    error = %fault.message,
                    "ERDMA device discovery failed"
                );
            }
            return;
        };

        if devices.is_empty() {
            warn!(
                event = "startup_inventory",
                node = %self.node_name,
                "No ERDMA devices found"
            );
        }

        for device in devices {
            match device.counters {
                Some(counters) => info!(
                    event = "startup_inventory",
                    node = %self.node_name,
                    device = %device.name,
                    guid = %device.guid,
                    counters = counters,
                    "ERDMA device found"
                ),
                None => {
                    let error = report
                        .faults_in(ScrapeStage::Stats)
                        .find(|f| f.device.as_deref() == Some(device.name.as_str()))
                        .map(|f| f.message.as_str())
                        .unwrap_or("unknown");
                    warn!(
                        event = "startup_inventory",
                        node = %self.node_name,
                        device = %device.name,
                        guid = %device.guid,
                        error = %error,
                        "ERDMA device found but statistics unavailable"
                    );
                }
            }
        }
    }

    pub fn log_scrape(&self, report: &ScrapeReport) {
        if report.faults.is_empty() {
            debug!(
                event = "scrape_completed",
                node = %self.node_name,
                devices = ?report.device_count(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Scrape completed"
            );
        } else {
            warn!(
                event = "scrape_completed",
                node = %self.node_name,
                devices = ?report.device_count(),
                faults = report.faults.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Scrape completed with omitted data"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ScrapeFault;
    use std::time::Duration;

    #[test]
    fn test_observe_scrape_counts_faults_per_stage() {
        // Global registry: assert on deltas, other tests may share it.
        let metrics = ExporterMetrics::new();
        let scrapes_before = metrics.scrapes();
        let stats_before = metrics.command_failures(ScrapeStage::Stats);

        metrics.observe_scrape(&ScrapeReport {
            node: "node-a".to_string(),
            version: Some("0.2.38".to_string()),
            devices: Some(Vec::new()),
            faults: vec![
                ScrapeFault {
                    stage: ScrapeStage::Stats,
                    device: Some("erdma_0".to_string()),
                    message: "boom".to_string(),
                },
                ScrapeFault {
                    stage: ScrapeStage::Stats,
                    device: Some("erdma_1".to_string()),
                    message: "boom".to_string(),
                },
            ],
            elapsed: Duration::from_millis(20),
        });

        assert!(metrics.scrapes() > scrapes_before);
        assert!(metrics.command_failures(ScrapeStage::Stats) >= stats_before + 2);
    }

    #[test]
    fn test_build_info_is_exported() {
        let metrics = ExporterMetrics::new();
        metrics.set_build_info("0.1.0");

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "erdma_exporter_build_info"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_metrics_are_exported() {
        ExporterMetrics::new();

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name().starts_with("process_")));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-node");
        assert_eq!(logger.node_name, "test-node");
    }
}
