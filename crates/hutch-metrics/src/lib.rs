//! hutch-metrics — the collection and aggregation engine.
//!
//! Turns raw stat records from the RabbitMQ management API into labeled
//! gauge vectors and Prometheus-compatible text exposition.
//!
//! # Architecture
//!
//! ```text
//! ExporterSet::collect()           ← one call per scrape
//!   └── DomainExporter::collect()  ← one per enabled module
//!         ├── StatsProvider::fetch()
//!         ├── GaugeVectorStore::reset()
//!         ├── cycle::aggregate()   → sums per label tuple + state counts
//!         └── GaugeVectorStore::emit() → MetricSink (Exposition)
//!
//! ExporterRegistry                 ← name → constructor table
//!   └── build(enabled) → Vec<Box<dyn Exporter>>
//! ```

pub mod catalog;
pub mod cycle;
pub mod exporter;
pub mod prometheus;
pub mod registry;
pub mod set;
pub mod store;

pub use catalog::{MetricCatalog, MetricDescriptor, StateDescriptor};
pub use exporter::{CollectError, DomainExporter, Exporter, ExporterPhase};
pub use prometheus::{Exposition, MetricDesc, MetricSink};
pub use registry::{ExporterContext, ExporterRegistry, RegistryError};
pub use set::{ExporterSet, ScrapeReport};
pub use store::{GaugeVec, GaugeVectorStore};
