//! One fetch → reset → aggregate → emit pass.
//!
//! A failed fetch returns before the store is touched, so whatever the last
//! successful cycle published stays in place until the next success.

use tracing::debug;

use hutch_core::{FetchError, StatRecord, StatsProvider};

use crate::catalog::MetricCatalog;
use crate::prometheus::MetricSink;
use crate::store::GaugeVectorStore;

/// What a successful cycle produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub records: usize,
    pub series: usize,
    pub state_series: usize,
}

/// Run one collection cycle for `catalog`'s domain.
///
/// The caller must hold exclusive access to `store` for the whole call.
pub async fn run_cycle(
    provider: &dyn StatsProvider,
    catalog: &MetricCatalog,
    store: &mut GaugeVectorStore,
    sink: &mut dyn MetricSink,
) -> Result<CycleSummary, FetchError> {
    let label_keys = catalog.required_label_keys();
    let records = provider.fetch(catalog.domain(), &label_keys).await?;

    store.reset();
    aggregate(catalog, store, &records);
    store.emit(sink);

    let summary = CycleSummary {
        records: records.len(),
        series: store.series_count(),
        state_series: store.state().len(),
    };
    debug!(
        domain = catalog.domain(),
        records = summary.records,
        series = summary.series,
        state_series = summary.state_series,
        "collection cycle complete"
    );
    Ok(summary)
}

/// Sum every tracked metric per label tuple and count sentinel-carrying
/// records per state tuple. Expects a freshly reset store.
pub fn aggregate(catalog: &MetricCatalog, store: &mut GaugeVectorStore, records: &[StatRecord]) {
    let metric_labels = catalog.metric_labels();

    for metric in catalog.describe() {
        for record in records {
            if let Some(value) = record.metric(metric.key) {
                store.add(metric.key, &record.label_values(metric_labels), value);
            }
        }
    }

    let state_labels = catalog.state_labels();
    for record in records {
        if record.metric(catalog.sentinel_key()).is_some() {
            store.increment_state(&record.label_values(&state_labels));
        }
    }
}
