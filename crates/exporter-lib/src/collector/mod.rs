//! ERDMA metrics collection
//!
//! This module turns the output of the ERDMA userspace tools into Prometheus
//! samples. `ibv_devices` lists the adapters, `eadm ver` reports the kernel
//! driver version and `eadm stat -d <device>` prints per-device counters.
//! Each scrape runs the tools afresh; nothing is cached between scrapes.

mod catalog;
mod devices;
mod emitter;
mod node;
mod runner;
mod scrape;
mod stats;
mod version;


pub use catalog::{
    labels, CatalogError, CounterDesc, CounterSpec, MetricCatalog, COUNTERS, NAMESPACE,
};
pub use devices::{list_devices, parse_devices};
pub use emitter::MetricSink;
pub use node::{resolve_node_name, NODE_NAME_ENV, UNKNOWN_NODE};
pub use runner::{resolve_program, CommandError, CommandRunner, ProcessRunner};
pub use scrape::{
    DeviceReport, ErdmaCollector, Scrape, ScrapeFault, ScrapeReport, ScrapeStage, ToolCommands,
};
pub use stats::{fetch_stats, parse_stats};
pub use version::{parse_version, probe_version, VersionError, VERSION_SUBCOMMAND};

pub use async_trait::async_trait;
