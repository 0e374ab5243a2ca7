//! Live gauge vectors for one exporter.
//!
//! The store is owned by a single exporter and only mutated while that
//! exporter holds its cycle lock, so no interior synchronisation lives here.

use std::collections::BTreeMap;

use tracing::warn;

use crate::catalog::MetricCatalog;
use crate::prometheus::{MetricDesc, MetricSink};

/// A gauge exposed as one series per label tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeVec {
    desc: MetricDesc,
    /// Label values (ordered like `desc.labels`) → accumulated value.
    values: BTreeMap<Vec<String>, f64>,
}

impl GaugeVec {
    pub fn new(desc: MetricDesc) -> Self {
        Self {
            desc,
            values: BTreeMap::new(),
        }
    }

    pub fn desc(&self) -> &MetricDesc {
        &self.desc
    }

    pub fn reset(&mut self) {
        self.values.clear();
    }

    /// Add `delta` to the series for `label_values`, creating it at 0 first.
    pub fn add(&mut self, label_values: &[&str], delta: f64) {
        if label_values.len() != self.desc.labels.len() {
            warn!(
                metric = %self.desc.name,
                expected = self.desc.labels.len(),
                got = label_values.len(),
                "label cardinality mismatch, sample dropped"
            );
            return;
        }
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
        *self.values.entry(key).or_insert(0.0) += delta;
    }

    pub fn get(&self, label_values: &[&str]) -> Option<f64> {
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
        self.values.get(&key).copied()
    }

    /// Number of series currently held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn emit(&self, sink: &mut dyn MetricSink) {
        sink.describe(&self.desc);
        for (labels, value) in &self.values {
            sink.gauge(&self.desc, labels, *value);
        }
    }
}

/// Gauge vectors keyed by metric key, plus the state-cardinality vector.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeVectorStore {
    /// Catalog order is kept so expositions are stable between scrapes.
    vectors: Vec<(&'static str, GaugeVec)>,
    state: GaugeVec,
}

impl GaugeVectorStore {
    pub fn from_catalog(catalog: &MetricCatalog) -> Self {
        Self {
            vectors: catalog
                .describe()
                .iter()
                .map(|m| (m.key, GaugeVec::new(m.desc.clone())))
                .collect(),
            state: GaugeVec::new(catalog.state().desc.clone()),
        }
    }

    /// Clear every vector, the state vector included.
    pub fn reset(&mut self) {
        for (_, vec) in &mut self.vectors {
            vec.reset();
        }
        self.state.reset();
    }

    /// Accumulate into the vector registered for `metric_key`. Unknown keys
    /// are ignored.
    pub fn add(&mut self, metric_key: &str, label_values: &[&str], delta: f64) {
        if let Some(vec) = self.vector_mut(metric_key) {
            vec.add(label_values, delta);
        }
    }

    pub fn increment_state(&mut self, label_values: &[&str]) {
        self.state.add(label_values, 1.0);
    }

    /// Hand every series to `sink`: metric vectors in catalog order, then
    /// the state vector.
    pub fn emit(&self, sink: &mut dyn MetricSink) {
        for (_, vec) in &self.vectors {
            vec.emit(sink);
        }
        self.state.emit(sink);
    }

    pub fn vector(&self, metric_key: &str) -> Option<&GaugeVec> {
        self.vectors
            .iter()
            .find(|(key, _)| *key == metric_key)
            .map(|(_, vec)| vec)
    }

    fn vector_mut(&mut self, metric_key: &str) -> Option<&mut GaugeVec> {
        self.vectors
            .iter_mut()
            .find(|(key, _)| *key == metric_key)
            .map(|(_, vec)| vec)
    }

    pub fn state(&self) -> &GaugeVec {
        &self.state
    }

    pub fn value(&self, metric_key: &str, label_values: &[&str]) -> Option<f64> {
        self.vector(metric_key)?.get(label_values)
    }

    pub fn state_value(&self, label_values: &[&str]) -> Option<f64> {
        self.state.get(label_values)
    }

    /// Total series across all metric vectors (state vector excluded).
    pub fn series_count(&self) -> usize {
        self.vectors.iter().map(|(_, vec)| vec.len()).sum()
    }
}
