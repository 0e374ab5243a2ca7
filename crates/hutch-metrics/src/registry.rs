//! Exporter registry, a name to constructor table.
//!
//! The table is built explicitly during bootstrap and handed to whoever
//! assembles the exporter set; nothing here is process-global.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use hutch_core::StatsProvider;

use crate::catalog::{CatalogError, MetricCatalog, CONNECTIONS};
use crate::exporter::{DomainExporter, Exporter};

/// Everything a constructor may need to build an exporter.
#[derive(Clone)]
pub struct ExporterContext {
    pub provider: Arc<dyn StatsProvider>,
    pub namespace: String,
}

pub type ExporterConstructor = fn(&ExporterContext) -> Result<Box<dyn Exporter>, CatalogError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("exporter {0:?} is registered or enabled more than once")]
    Duplicate(String),

    #[error("unknown exporter {name:?} (available: {available})")]
    Unknown { name: String, available: String },

    #[error("exporter {name:?} has an invalid catalog: {source}")]
    Catalog {
        name: String,
        #[source]
        source: CatalogError,
    },
}

#[derive(Default)]
pub struct ExporterRegistry {
    constructors: BTreeMap<String, ExporterConstructor>,
}

impl ExporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every exporter shipped with hutch.
    pub fn builtin() -> Self {
        let mut constructors: BTreeMap<String, ExporterConstructor> = BTreeMap::new();
        constructors.insert("connections".to_string(), new_connections_exporter);
        Self { constructors }
    }

    pub fn register(&mut self, name: &str, constructor: ExporterConstructor) -> Result<(), RegistryError> {
        if self.constructors.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.constructors.insert(name.to_string(), constructor);
        debug!(exporter = name, "exporter registered");
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Construct the exporters listed in `enabled`, in that order. A name
    /// listed twice is rejected: both copies would publish the same series.
    pub fn build(
        &self,
        enabled: &[String],
        ctx: &ExporterContext,
    ) -> Result<Vec<Box<dyn Exporter>>, RegistryError> {
        let mut seen = HashSet::new();
        enabled
            .iter()
            .map(|name| {
                if !seen.insert(name.as_str()) {
                    return Err(RegistryError::Duplicate(name.clone()));
                }
                let constructor = self.constructors.get(name).ok_or_else(|| RegistryError::Unknown {
                    name: name.clone(),
                    available: self.names().join(", "),
                })?;
                constructor(ctx).map_err(|source| RegistryError::Catalog {
                    name: name.clone(),
                    source,
                })
            })
            .collect()
    }
}

fn new_connections_exporter(ctx: &ExporterContext) -> Result<Box<dyn Exporter>, CatalogError> {
    let catalog = MetricCatalog::new(&CONNECTIONS, &ctx.namespace);
    catalog.validate()?;
    Ok(Box::new(DomainExporter::new(
        "connections",
        catalog,
        ctx.provider.clone(),
    )))
}
