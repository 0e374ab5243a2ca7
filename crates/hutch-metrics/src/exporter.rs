//! Exporters: the describe/collect units the scrape handler drives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use hutch_core::{FetchError, StatsProvider};

use crate::catalog::MetricCatalog;
use crate::cycle::{run_cycle, CycleSummary};
use crate::prometheus::MetricSink;
use crate::store::GaugeVectorStore;

/// Errors surfaced by [`Exporter::collect`].
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// A unit that can describe and collect one family of metrics.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Registry name, also used as the `module` label.
    fn name(&self) -> &str;

    /// Emit every descriptor without values.
    fn describe(&self, sink: &mut dyn MetricSink);

    /// Run exactly one collection cycle into `sink`.
    async fn collect(&self, sink: &mut dyn MetricSink) -> Result<(), CollectError>;

    /// Emit whatever the last successful cycle left behind, without fetching.
    async fn publish_retained(&self, sink: &mut dyn MetricSink);
}

/// Observable phase of an exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterPhase {
    Idle,
    Collecting,
}

/// Exporter for one management API domain, driven by a [`MetricCatalog`].
pub struct DomainExporter {
    name: String,
    catalog: MetricCatalog,
    provider: Arc<dyn StatsProvider>,
    /// Held for a whole cycle: at most one cycle mutates the store at a time.
    store: Mutex<GaugeVectorStore>,
    collecting: AtomicBool,
}

/// Clears the collecting flag even if the cycle future is dropped.
struct PhaseGuard<'a>(&'a AtomicBool);

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DomainExporter {
    pub fn new(name: &str, catalog: MetricCatalog, provider: Arc<dyn StatsProvider>) -> Self {
        let store = GaugeVectorStore::from_catalog(&catalog);
        Self {
            name: name.to_string(),
            catalog,
            provider,
            store: Mutex::new(store),
            collecting: AtomicBool::new(false),
        }
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    pub fn phase(&self) -> ExporterPhase {
        if self.collecting.load(Ordering::Acquire) {
            ExporterPhase::Collecting
        } else {
            ExporterPhase::Idle
        }
    }

    /// Copy of the store as it stands between cycles.
    pub async fn snapshot(&self) -> GaugeVectorStore {
        self.store.lock().await.clone()
    }

    /// Run one cycle and report what it produced.
    pub async fn run_once(&self, sink: &mut dyn MetricSink) -> Result<CycleSummary, CollectError> {
        let mut store = self.store.lock().await;
        self.collecting.store(true, Ordering::Release);
        let _phase = PhaseGuard(&self.collecting);

        let summary = run_cycle(self.provider.as_ref(), &self.catalog, &mut store, sink).await?;
        Ok(summary)
    }
}

#[async_trait]
impl Exporter for DomainExporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self, sink: &mut dyn MetricSink) {
        for metric in self.catalog.describe() {
            sink.describe(&metric.desc);
        }
        sink.describe(&self.catalog.state().desc);
    }

    async fn collect(&self, sink: &mut dyn MetricSink) -> Result<(), CollectError> {
        self.run_once(sink).await.map(|_| ())
    }

    async fn publish_retained(&self, sink: &mut dyn MetricSink) {
        self.store.lock().await.emit(sink);
    }
}
