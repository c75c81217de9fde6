//! Per-scrape collection of ERDMA metrics
//!
//! A scrape resolves the node name, probes the driver version, enumerates
//! devices and then fetches statistics for each device in order. Failures
//! only remove the data they affect: a failed version probe drops the
//! version metric, a failed enumeration drops every device, and a failed
//! stats fetch drops that one device's counters.

use super::catalog::MetricCatalog;
use super::devices::list_devices;
use super::emitter::MetricSink;
use super::node::resolve_node_name;
use super::runner::CommandRunner;
use super::stats::fetch_stats;
use super::version::probe_version;
use prometheus::proto::MetricFamily;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Names of the external tools the collector runs
#[derive(Debug, Clone)]
pub struct ToolCommands {
    /// Version and statistics tool (default: `eadm`)
    pub eadm: String,
    /// Device listing tool (default: `ibv_devices`)
    pub ibv_devices: String,
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self {
            eadm: "eadm".to_string(),
            ibv_devices: "ibv_devices".to_string(),
        }
    }
}

/// Pipeline stage a fault occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStage {
    Version,
    Devices,
    Stats,
}

impl ScrapeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStage::Version => "version",
            ScrapeStage::Devices => "devices",
            ScrapeStage::Stats => "stats",
        }
    }
}

/// A failure that removed some data from a scrape
#[derive(Debug, Clone)]
pub struct ScrapeFault {
    pub stage: ScrapeStage,
    /// Set for faults confined to one device
    pub device: Option<String>,
    pub message: String,
}

/// Outcome of one device within a scrape
#[derive(Debug, Clone)]
pub struct DeviceReport {
    pub name: String,
    pub guid: String,
    /// Counter samples emitted, `None` when the stats fetch failed
    pub counters: Option<usize>,
}

/// What happened during a scrape
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub node: String,
    pub version: Option<String>,
    /// `None` when device enumeration failed
    pub devices: Option<Vec<DeviceReport>>,
    pub faults: Vec<ScrapeFault>,
    pub elapsed: Duration,
}

impl ScrapeReport {
    pub fn has_fault(&self, stage: ScrapeStage) -> bool {
        self.faults.iter().any(|f| f.stage == stage)
    }

    pub fn faults_in(&self, stage: ScrapeStage) -> impl Iterator<Item = &ScrapeFault> {
        self.faults.iter().filter(move |f| f.stage == stage)
    }

    pub fn device_count(&self) -> Option<usize> {
        self.devices.as_ref().map(Vec::len)
    }
}

/// Result of one scrape: the samples to expose plus the report
#[derive(Debug)]
pub struct Scrape {
    pub families: Vec<MetricFamily>,
    pub report: ScrapeReport,
}

/// Collects ERDMA metrics on demand
///
/// Holds no mutable state; concurrent scrapes are independent.
pub struct ErdmaCollector {
    runner: Arc<dyn CommandRunner>,
    catalog: Arc<MetricCatalog>,
    commands: ToolCommands,
}

impl ErdmaCollector {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        catalog: Arc<MetricCatalog>,
        commands: ToolCommands,
    ) -> Self {
        Self {
            runner,
            catalog,
            commands,
        }
    }

    /// Run one scrape using the node name from the environment
    pub async fn scrape(&self) -> Scrape {
        self.scrape_as(resolve_node_name()).await
    }

    /// Run one scrape labelling every sample with `node`
    pub async fn scrape_as(&self, node: String) -> Scrape {
        let start = Instant::now();
        let runner = self.runner.as_ref();
        let mut sink = MetricSink::new(&self.catalog);
        let mut faults = Vec::new();

        let version = match probe_version(runner, &self.commands.eadm).await {
            Ok(version) => {
                sink.emit_version(&version, &node);
                Some(version)
            }
            Err(e) => {
                warn!(node = %node, error = %e, "Failed to probe ERDMA driver version");
                faults.push(ScrapeFault {
                    stage: ScrapeStage::Version,
                    device: None,
                    message: e.to_string(),
                });
                None
            }
        };

        let devices = match list_devices(runner, &self.commands.ibv_devices).await {
            Ok(devices) => devices,
            Err(e) => {
                warn!(node = %node, error = %e, "Failed to enumerate ERDMA devices");
                faults.push(ScrapeFault {
                    stage: ScrapeStage::Devices,
                    device: None,
                    message: e.to_string(),
                });
                return Self::finish(sink, node, version, None, faults, start);
            }
        };

        let mut reports = Vec::with_capacity(devices.len());
        for device in devices {
            sink.emit_device_info(&device, &node);

            let counters = match fetch_stats(runner, &self.commands.eadm, &device.name).await {
                Ok(stats) => Some(sink.emit_counters(&stats, &device.name, &node)),
                Err(e) => {
                    warn!(
                        node = %node,
                        device = %device.name,
                        error = %e,
                        "Failed to fetch device statistics"
                    );
                    faults.push(ScrapeFault {
                        stage: ScrapeStage::Stats,
                        device: Some(device.name.clone()),
                        message: e.to_string(),
                    });
                    None
                }
            };

            reports.push(DeviceReport {
                name: device.name,
                guid: device.guid,
                counters,
            });
        }

        Self::finish(sink, node, version, Some(reports), faults, start)
    }

    fn finish(
        sink: MetricSink<'_>,
        node: String,
        version: Option<String>,
        devices: Option<Vec<DeviceReport>>,
        faults: Vec<ScrapeFault>,
        start: Instant,
    ) -> Scrape {
        let samples = sink.len();
        let report = ScrapeReport {
            node,
            version,
            devices,
            faults,
            elapsed: start.elapsed(),
        };

        debug!(
            node = %report.node,
            samples = samples,
            devices = ?report.device_count(),
            faults = report.faults.len(),
            elapsed_ms = report.elapsed.as_millis(),
            "Scrape complete"
        );

        Scrape {
            families: sink.into_families(),
            report,
        }
    }
}
