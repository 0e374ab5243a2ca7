pub mod config;
pub mod error;
pub mod provider;
pub mod types;

pub use config::ExporterConfig;
pub use error::{ConfigError, FetchError};
pub use provider::StatsProvider;
pub use types::*;
