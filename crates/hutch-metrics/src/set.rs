//! The full set of enabled exporters, collected once per scrape.
//!
//! Besides each module's own series, a scrape publishes `<ns>_up`,
//! `<ns>_module_up{module}` and `<ns>_module_scrape_duration_seconds{module}`.

use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::exporter::Exporter;
use crate::prometheus::{fq_name, MetricDesc, MetricSink};
use crate::registry::{ExporterContext, ExporterRegistry, RegistryError};

/// Outcome of one scrape across all modules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeReport {
    /// `(module, error)` for every module whose collect failed.
    pub failures: Vec<(String, String)>,
}

impl ScrapeReport {
    pub fn all_up(&self) -> bool {
        self.failures.is_empty()
    }

    /// One line per failed module.
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|(module, error)| format!("{module}: {error}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct ExporterSet {
    exporters: Vec<Box<dyn Exporter>>,
    publish_stale_on_error: bool,
    /// Serialises whole scrapes.
    scrape: Mutex<()>,
    up: MetricDesc,
    module_up: MetricDesc,
    module_duration: MetricDesc,
}

impl ExporterSet {
    pub fn new(exporters: Vec<Box<dyn Exporter>>, namespace: &str, publish_stale_on_error: bool) -> Self {
        Self {
            exporters,
            publish_stale_on_error,
            scrape: Mutex::new(()),
            up: MetricDesc::new(
                fq_name(namespace, "up"),
                "Was the last scrape of rabbitmq successful.",
                &[],
            ),
            module_up: MetricDesc::new(
                fq_name(namespace, "module_up"),
                "Was the last scrape of the module successful.",
                &["module"],
            ),
            module_duration: MetricDesc::new(
                fq_name(namespace, "module_scrape_duration_seconds"),
                "Duration of the last scrape of the module in seconds.",
                &["module"],
            ),
        }
    }

    /// Build the set from the registry entries named in `enabled`.
    pub fn from_registry(
        registry: &ExporterRegistry,
        enabled: &[String],
        ctx: &ExporterContext,
        publish_stale_on_error: bool,
    ) -> Result<Self, RegistryError> {
        let exporters = registry.build(enabled, ctx)?;
        Ok(Self::new(exporters, &ctx.namespace, publish_stale_on_error))
    }

    pub fn names(&self) -> Vec<&str> {
        self.exporters.iter().map(|e| e.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.exporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty()
    }

    pub fn describe(&self, sink: &mut dyn MetricSink) {
        for exporter in &self.exporters {
            exporter.describe(sink);
        }
        sink.describe(&self.up);
        sink.describe(&self.module_up);
        sink.describe(&self.module_duration);
    }

    /// Collect every module into `sink`, then the scrape-level gauges.
    pub async fn collect(&self, sink: &mut dyn MetricSink) -> ScrapeReport {
        let _scrape = self.scrape.lock().await;
        let mut report = ScrapeReport::default();

        for exporter in &self.exporters {
            let module = vec![exporter.name().to_string()];
            let start = Instant::now();

            let up = match exporter.collect(sink).await {
                Ok(()) => 1.0,
                Err(e) => {
                    warn!(module = exporter.name(), error = %e, "module collection failed");
                    report.failures.push((exporter.name().to_string(), e.to_string()));
                    if self.publish_stale_on_error {
                        exporter.publish_retained(sink).await;
                    }
                    0.0
                }
            };

            let elapsed = start.elapsed().as_secs_f64();
            sink.gauge(&self.module_up, &module, up);
            sink.gauge(&self.module_duration, &module, elapsed);
        }

        sink.gauge(&self.up, &[], if report.all_up() { 1.0 } else { 0.0 });
        debug!(
            modules = self.exporters.len(),
            failed = report.failures.len(),
            "scrape complete"
        );
        report
    }
}
