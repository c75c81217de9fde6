//! Turns parsed device data into Prometheus samples

use super::catalog::MetricCatalog;
use crate::models::{CounterSnapshot, Device};
use prometheus::core::Desc;
use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType};

/// Collects the samples of one scrape, grouped per descriptor
pub struct MetricSink<'a> {
    catalog: &'a MetricCatalog,
    driver_version: Vec<Metric>,
    device_info: Vec<Metric>,
    counters: Vec<Vec<Metric>>,
}

impl<'a> MetricSink<'a> {
    pub fn new(catalog: &'a MetricCatalog) -> Self {
        Self {
            catalog,
            driver_version: Vec::new(),
            device_info: Vec::new(),
            counters: vec![Vec::new(); catalog.counters.len()],
        }
    }

    /// `erdma_driver_version{version, node} 1`
    pub fn emit_version(&mut self, version: &str, node: &str) {
        self.driver_version
            .push(gauge(&self.catalog.driver_version, &[version, node], 1.0));
    }

    /// `erdma_device_info{device, node_guid, node} 1`
    pub fn emit_device_info(&mut self, device: &Device, node: &str) {
        self.device_info.push(gauge(
            &self.catalog.device_info,
            &[&device.name, &device.guid, node],
            1.0,
        ));
    }

    /// Emit every catalog counter present in `stats`
    ///
    /// Counters the device does not report are skipped; unknown keys are
    /// ignored. Returns the number of samples emitted.
    pub fn emit_counters(&mut self, stats: &CounterSnapshot, device: &str, node: &str) -> usize {
        let mut emitted = 0;
        for (counter, samples) in self.catalog.counters.iter().zip(self.counters.iter_mut()) {
            if let Some(&value) = stats.get(counter.key) {
                samples.push(counter_sample(&counter.desc, &[device, node], value as f64));
                emitted += 1;
            }
        }
        emitted
    }

    /// Total samples collected so far
    pub fn len(&self) -> usize {
        self.driver_version.len()
            + self.device_info.len()
            + self.counters.iter().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One family per descriptor that received samples
    pub fn into_families(self) -> Vec<MetricFamily> {
        let catalog = self.catalog;
        let mut families = Vec::new();

        push_family(
            &mut families,
            &catalog.driver_version,
            MetricType::GAUGE,
            self.driver_version,
        );
        push_family(
            &mut families,
            &catalog.device_info,
            MetricType::GAUGE,
            self.device_info,
        );
        for (counter, samples) in catalog.counters.iter().zip(self.counters) {
            push_family(&mut families, &counter.desc, MetricType::COUNTER, samples);
        }

        families
    }
}

fn push_family(
    families: &mut Vec<MetricFamily>,
    desc: &Desc,
    kind: MetricType,
    samples: Vec<Metric>,
) {
    // The text encoder rejects families without samples.
    if samples.is_empty() {
        return;
    }

    let mut family = MetricFamily::default();
    family.set_name(desc.fq_name.clone());
    family.set_help(desc.help.clone());
    family.set_field_type(kind);
    family.set_metric(samples.into());
    families.push(family);
}

fn labeled(desc: &Desc, values: &[&str]) -> Metric {
    debug_assert_eq!(desc.variable_labels.len(), values.len());

    let labels: Vec<LabelPair> = desc
        .variable_labels
        .iter()
        .zip(values)
        .map(|(name, value)| {
            let mut pair = LabelPair::default();
            pair.set_name(name.clone());
            pair.set_value(value.to_string());
            pair
        })
        .collect();

    let mut metric = Metric::default();
    metric.set_label(labels.into());
    metric
}

fn gauge(desc: &Desc, values: &[&str], value: f64) -> Metric {
    let mut metric = labeled(desc, values);
    let mut gauge = Gauge::default();
    gauge.set_value(value);
    metric.set_gauge(gauge);
    metric
}

fn counter_sample(desc: &Desc, values: &[&str], value: f64) -> Metric {
    let mut metric = labeled(desc, values);
    let mut counter = Counter::default();
    counter.set_value(value);
    metric.set_counter(counter);
    metric
}
