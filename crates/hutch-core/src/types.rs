//! Shared types used across hutch crates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One observation unit returned by the management API for a domain.
///
/// A record is created fresh on every fetch and dropped once the collection
/// cycle that requested it has finished.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatRecord {
    /// Numeric values keyed by metric key. Not every key is present on
    /// every record.
    pub metrics: HashMap<String, f64>,
    /// Label values keyed by label name.
    pub labels: HashMap<String, String>,
}

impl StatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, name: &str, value: &str) -> Self {
        self.labels.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_metric(mut self, key: &str, value: f64) -> Self {
        self.metrics.insert(key.to_string(), value);
        self
    }

    /// Value of a metric key, if the record carries it.
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    /// Value of a label, or `""` when the record lacks it.
    pub fn label(&self, name: &str) -> &str {
        self.labels.get(name).map(String::as_str).unwrap_or("")
    }

    /// Label values for `names`, in order.
    pub fn label_values<'a>(&'a self, names: &[&str]) -> Vec<&'a str> {
        names.iter().map(|n| self.label(n)).collect()
    }
}
