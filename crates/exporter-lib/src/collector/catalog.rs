//! Fixed ERDMA metric schema
//!
//! Every exported counter is one row of [`COUNTERS`]. The table drives both
//! descriptor registration at startup and sample emission on each scrape.

use prometheus::core::Desc;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Metric name prefix
pub const NAMESPACE: &str = "erdma";

/// Label names
pub mod labels {
    pub const DEVICE: &str = "device";
    pub const NODE: &str = "node";
    pub const NODE_GUID: &str = "node_guid";
    pub const VERSION: &str = "version";
}

/// A per-device counter exported from `eadm stat` output
#[derive(Debug, Clone, Copy)]
pub struct CounterSpec {
    /// Metric name without the namespace prefix
    pub name: &'static str,
    pub help: &'static str,
    /// Counter key as printed by the stats tool
    pub key: &'static str,
}

const fn counter(name: &'static str, help: &'static str, key: &'static str) -> CounterSpec {
    CounterSpec { name, help, key }
}

#[rustfmt::skip]
pub const COUNTERS: &[CounterSpec] = &[
    counter("listen_create_total", "Total number of listen create operations", "listen_create_cnt"),
    counter("listen_ipv6_total", "Total number of IPv6 listen operations", "listen_ipv6_cnt"),
    counter("listen_success_total", "Total number of successful listen operations", "listen_success_cnt"),
    counter("listen_failed_total", "Total number of failed listen operations", "listen_failed_cnt"),
    counter("listen_destroy_total", "Total number of listen destroy operations", "listen_destroy_cnt"),
    counter("accept_total", "Total number of accept operations", "accept_total_cnt"),
    counter("accept_success_total", "Total number of successful accept operations", "accept_success_cnt"),
    counter("accept_failed_total", "Total number of failed accept operations", "accept_failed_cnt"),
    counter("reject_total", "Total number of reject operations", "reject_cnt"),
    counter("reject_failed_total", "Total number of failed reject operations", "reject_failed_cnt"),
    counter("connect_total", "Total number of connect operations", "connect_total_cnt"),
    counter("connect_success_total", "Total number of successful connect operations", "connect_success_cnt"),
    counter("connect_failed_total", "Total number of failed connect operations", "connect_failed_cnt"),
    counter("connect_timeout_total", "Total number of connect timeout operations", "connect_timeout_cnt"),
    counter("connect_reset_total", "Total number of connect reset operations", "connect_reset_cnt"),
    counter("cmdq_submitted_total", "Total number of submitted command queue operations", "cmdq_submitted_cnt"),
    counter("cmdq_completed_total", "Total number of completed command queue operations", "cmdq_comp_cnt"),
    counter("cmdq_eq_notify_total", "Total number of command queue event queue notifications", "cmdq_eq_notify_cnt"),
    counter("cmdq_eq_event_total", "Total number of command queue event queue events", "cmdq_eq_event_cnt"),
    counter("cmdq_cq_armed_total", "Total number of command queue completion queue armed operations", "cmdq_cq_armed_cnt"),
    counter("aeq_event_total", "Total number of async event queue events", "erdma_aeq_event_cnt"),
    counter("aeq_notify_total", "Total number of async event queue notifications", "erdma_aeq_notify_cnt"),
    counter("verbs_alloc_mr_total", "Total number of verbs memory region allocations", "verbs_alloc_mr_cnt"),
    counter("verbs_alloc_mr_failed_total", "Total number of failed verbs memory region allocations", "verbs_alloc_mr_failed_cnt"),
    counter("verbs_alloc_pd_total", "Total number of verbs protection domain allocations", "verbs_alloc_pd_cnt"),
    counter("verbs_alloc_pd_failed_total", "Total number of failed verbs protection domain allocations", "verbs_alloc_pd_failed_cnt"),
    counter("verbs_alloc_uctx_total", "Total number of verbs user context allocations", "verbs_alloc_uctx_cnt"),
    counter("verbs_alloc_uctx_failed_total", "Total number of failed verbs user context allocations", "verbs_alloc_uctx_failed_cnt"),
    counter("verbs_create_cq_total", "Total number of verbs completion queue creations", "verbs_create_cq_cnt"),
    counter("verbs_create_cq_failed_total", "Total number of failed verbs completion queue creations", "verbs_create_cq_failed_cnt"),
    counter("verbs_create_qp_total", "Total number of verbs queue pair creations", "verbs_create_qp_cnt"),
    counter("verbs_create_qp_failed_total", "Total number of failed verbs queue pair creations", "verbs_create_qp_failed_cnt"),
    counter("verbs_dealloc_pd_total", "Total number of verbs protection domain deallocations", "verbs_dealloc_pd_cnt"),
    counter("verbs_dealloc_uctx_total", "Total number of verbs user context deallocations", "verbs_dealloc_uctx_cnt"),
    counter("verbs_dereg_mr_total", "Total number of verbs memory region deregistrations", "verbs_dereg_mr_cnt"),
    counter("verbs_dereg_mr_failed_total", "Total number of failed verbs memory region deregistrations", "verbs_dereg_mr_failed_cnt"),
    counter("verbs_destroy_cq_total", "Total number of verbs completion queue destructions", "verbs_destroy_cq_cnt"),
    counter("verbs_destroy_cq_failed_total", "Total number of failed verbs completion queue destructions", "verbs_destroy_cq_failed_cnt"),
    counter("verbs_destroy_qp_total", "Total number of verbs queue pair destructions", "verbs_destroy_qp_cnt"),
    counter("verbs_destroy_qp_failed_total", "Total number of failed verbs queue pair destructions", "verbs_destroy_qp_failed_cnt"),
    counter("verbs_get_dma_mr_total", "Total number of verbs DMA memory region get operations", "verbs_get_dma_mr_cnt"),
    counter("verbs_get_dma_mr_failed_total", "Total number of failed verbs DMA memory region get operations", "verbs_get_dma_mr_failed_cnt"),
    counter("verbs_reg_usr_mr_total", "Total number of verbs user memory region registrations", "verbs_reg_usr_mr_cnt"),
    counter("verbs_reg_usr_mr_failed_total", "Total number of failed verbs user memory region registrations", "verbs_reg_usr_mr_failed_cnt"),
    counter("hw_tx_requests_total", "Total number of hardware transmit requests", "hw_tx_reqs_cnt"),
    counter("hw_tx_packets_total", "Total number of hardware transmit packets", "hw_tx_packets_cnt"),
    counter("hw_tx_bytes_total", "Total number of hardware transmit bytes", "hw_tx_bytes_cnt"),
    counter("hw_disable_drop_total", "Total number of hardware disable drop operations", "hw_disable_drop_cnt"),
    counter("hw_bps_limit_drop_total", "Total number of hardware BPS limit drops", "hw_bps_limit_drop_cnt"),
    counter("hw_pps_limit_drop_total", "Total number of hardware PPS limit drops", "hw_pps_limit_drop_cnt"),
    counter("hw_rx_packets_total", "Total number of hardware receive packets", "hw_rx_packets_cnt"),
    counter("hw_rx_bytes_total", "Total number of hardware receive bytes", "hw_rx_bytes_cnt"),
    counter("hw_rx_disable_drop_total", "Total number of hardware receive disable drops", "hw_rx_disable_drop_cnt"),
    counter("hw_rx_bps_limit_drop_total", "Total number of hardware receive BPS limit drops", "hw_rx_bps_limit_drop_cnt"),
    counter("hw_rx_pps_limit_drop_total", "Total number of hardware receive PPS limit drops", "hw_rx_pps_limit_drop_cnt"),
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid metric descriptor {name}: {source}")]
    InvalidDescriptor {
        name: String,
        #[source]
        source: prometheus::Error,
    },

    #[error("duplicate metric name {0}")]
    Duplicate(String),
}

/// A registered per-device counter: its descriptor and source key
#[derive(Debug)]
pub struct CounterDesc {
    pub desc: Desc,
    pub key: &'static str,
}

/// Validated descriptors for every metric the collector can emit
///
/// Built once at startup and shared read-only between scrapes.
#[derive(Debug)]
pub struct MetricCatalog {
    pub driver_version: Desc,
    pub device_info: Desc,
    pub counters: Vec<CounterDesc>,
}

impl MetricCatalog {
    pub fn new() -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();

        let driver_version = build_desc(
            &mut seen,
            "driver_version",
            "ERDMA kernel driver version",
            &[labels::VERSION, labels::NODE],
        )?;
        let device_info = build_desc(
            &mut seen,
            "device_info",
            "ERDMA device information",
            &[labels::DEVICE, labels::NODE_GUID, labels::NODE],
        )?;

        let counters = COUNTERS
            .iter()
            .map(|spec| {
                build_desc(&mut seen, spec.name, spec.help, &[labels::DEVICE, labels::NODE])
                    .map(|desc| CounterDesc {
                        desc,
                        key: spec.key,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            driver_version,
            device_info,
            counters,
        })
    }

    /// All descriptors, info metrics first
    pub fn descs(&self) -> impl Iterator<Item = &Desc> {
        [&self.driver_version, &self.device_info]
            .into_iter()
            .chain(self.counters.iter().map(|c| &c.desc))
    }

    /// Number of descriptors, counters plus the two info metrics
    pub fn descriptor_count(&self) -> usize {
        self.counters.len() + 2
    }
}

fn build_desc(
    seen: &mut HashSet<String>,
    name: &str,
    help: &str,
    variable_labels: &[&str],
) -> Result<Desc, CatalogError> {
    let fq_name = format!("{NAMESPACE}_{name}");
    if !seen.insert(fq_name.clone()) {
        return Err(CatalogError::Duplicate(fq_name));
    }

    Desc::new(
        fq_name.clone(),
        help.to_string(),
        variable_labels.iter().map(|l| l.to_string()).collect(),
        HashMap::new(),
    )
    .map_err(|source| CatalogError::InvalidDescriptor {
        name: fq_name,
        source,
    })
}
