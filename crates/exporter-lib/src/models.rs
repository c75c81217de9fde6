//! Core data models for the ERDMA exporter

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One ERDMA adapter instance as reported by the device listing tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Stable device name (e.g. `erdma_0`), used to query its statistics
    pub name: String,
    /// Node GUID of the device
    pub guid: String,
}

impl Device {
    pub fn new(name: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guid: guid.into(),
        }
    }
}

/// Raw counters reported for a single device, keyed by the tool's counter name
pub type CounterSnapshot = HashMap<String, u64>;
