//! Static metric catalogs.
//!
//! A catalog maps the metric keys the management API reports for a domain
//! onto gauge-vector descriptors, plus the one state descriptor whose label
//! set adds the record's `state`. Catalogs are built once when an exporter
//! is constructed and only read afterwards.

use std::collections::HashSet;

use thiserror::Error;

use crate::prometheus::{fq_name, MetricDesc};

/// Shape of a monitored domain's records and the metrics derived from them.
#[derive(Debug, Clone, Copy)]
pub struct DomainShape {
    /// Management API endpoint name, e.g. `connections`.
    pub domain: &'static str,
    /// Labels every gauge vector carries, in order.
    pub labels: &'static [&'static str],
    /// Extra label appended for the state metric.
    pub state_label: &'static str,
    /// `(metric key, metric name, help)` for every tracked key.
    pub metrics: &'static [(&'static str, &'static str, &'static str)],
    /// `(metric name, help)` of the state-cardinality metric.
    pub state_metric: (&'static str, &'static str),
    /// Key present exactly once per logical entity; records carrying it are
    /// counted by the state metric.
    pub sentinel_key: &'static str,
}

pub const CONNECTIONS: DomainShape = DomainShape {
    domain: "connections",
    labels: &["vhost", "node", "peer_host", "user"],
    state_label: "state",
    metrics: &[
        ("channels", "connection_channels", "number of channels in use"),
        ("recv_oct", "connection_received_bytes", "received bytes"),
        ("recv_cnt", "connection_received_packets", "received packets"),
        ("send_oct", "connection_send_bytes", "send bytes"),
        ("send_cnt", "connection_send_packets", "send packets"),
        ("send_pend", "connection_send_pending", "Send queue size"),
    ],
    state_metric: (
        "connection_status",
        "Number of connections in a certain state aggregated per label combination.",
    ),
    // One "channels" entry per connection, so it doubles as an entity counter.
    sentinel_key: "channels",
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("invalid metric name {0:?}")]
    InvalidName(String),

    #[error("invalid label name {0:?}")]
    InvalidLabel(String),

    #[error("duplicate metric key {0:?}")]
    DuplicateKey(String),

    #[error("duplicate metric name {0:?}")]
    DuplicateName(String),

    #[error("label {0:?} is reserved for the state metric")]
    ReservedLabel(String),

    #[error("sentinel key {0:?} is not a tracked metric")]
    UnknownSentinel(String),
}

/// Descriptor of one gauge vector, keyed by the API's metric key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub key: &'static str,
    pub desc: MetricDesc,
}

/// Descriptor of the state-cardinality vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDescriptor {
    pub desc: MetricDesc,
}

#[derive(Debug, Clone)]
pub struct MetricCatalog {
    domain: &'static str,
    labels: &'static [&'static str],
    state_label: &'static str,
    sentinel_key: &'static str,
    metrics: Vec<MetricDescriptor>,
    state: StateDescriptor,
}

impl MetricCatalog {
    pub fn new(shape: &DomainShape, namespace: &str) -> Self {
        let metrics = shape
            .metrics
            .iter()
            .map(|&(key, name, help)| MetricDescriptor {
                key,
                desc: MetricDesc::new(fq_name(namespace, name), help, shape.labels),
            })
            .collect();

        let mut state_labels = shape.labels.to_vec();
        state_labels.push(shape.state_label);
        let (state_name, state_help) = shape.state_metric;

        Self {
            domain: shape.domain,
            labels: shape.labels,
            state_label: shape.state_label,
            sentinel_key: shape.sentinel_key,
            metrics,
            state: StateDescriptor {
                desc: MetricDesc::new(fq_name(namespace, state_name), state_help, &state_labels),
            },
        }
    }

    pub fn connections(namespace: &str) -> Self {
        Self::new(&CONNECTIONS, namespace)
    }

    pub fn domain(&self) -> &'static str {
        self.domain
    }

    pub fn describe(&self) -> &[MetricDescriptor] {
        &self.metrics
    }

    pub fn state(&self) -> &StateDescriptor {
        &self.state
    }

    pub fn sentinel_key(&self) -> &'static str {
        self.sentinel_key
    }

    /// Labels of every metric vector (the state label excluded).
    pub fn metric_labels(&self) -> &'static [&'static str] {
        self.labels
    }

    /// Labels of the state vector.
    pub fn state_labels(&self) -> Vec<&'static str> {
        let mut labels = self.labels.to_vec();
        labels.push(self.state_label);
        labels
    }

    /// Label keys the provider must fill on every record.
    pub fn required_label_keys(&self) -> Vec<&'static str> {
        self.state_labels()
    }

    pub fn get(&self, key: &str) -> Option<&MetricDescriptor> {
        self.metrics.iter().find(|m| m.key == key)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut keys = HashSet::new();
        let mut names = HashSet::new();

        for label in self.labels {
            if !is_valid_label(label) {
                return Err(CatalogError::InvalidLabel(label.to_string()));
            }
            if *label == self.state_label {
                return Err(CatalogError::ReservedLabel(label.to_string()));
            }
        }
        if !is_valid_label(self.state_label) {
            return Err(CatalogError::InvalidLabel(self.state_label.to_string()));
        }

        let all_names = self
            .metrics
            .iter()
            .map(|m| (Some(m.key), &m.desc.name))
            .chain(std::iter::once((None, &self.state.desc.name)));
        for (key, name) in all_names {
            if let Some(key) = key {
                if !keys.insert(key) {
                    return Err(CatalogError::DuplicateKey(key.to_string()));
                }
            }
            if !is_valid_name(name) {
                return Err(CatalogError::InvalidName(name.clone()));
            }
            if !names.insert(name.as_str()) {
                return Err(CatalogError::DuplicateName(name.clone()));
            }
        }

        if self.get(self.sentinel_key).is_none() {
            return Err(CatalogError::UnknownSentinel(self.sentinel_key.to_string()));
        }
        Ok(())
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_valid_label(label: &str) -> bool {
    let mut chars = label.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !label.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
