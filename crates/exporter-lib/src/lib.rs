//! ERDMA exporter library
//!
//! This crate provides the core functionality for:
//! - Discovering ERDMA devices and reading their counters via the vendor tools
//! - Mapping those counters onto a fixed Prometheus metric schema
//! - Serving metrics, health and readiness over HTTP
//! - Self-observability of the exporter

pub mod api;
pub mod collector;
pub mod health;
pub mod models;
pub mod observability;

pub use collector::{ErdmaCollector, MetricCatalog, ProcessRunner, Scrape, ScrapeReport};
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse};
pub use models::*;
pub use observability::{ExporterMetrics, StructuredLogger};
