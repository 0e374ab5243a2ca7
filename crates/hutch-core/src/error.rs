//! Error types shared by hutch crates.

use thiserror::Error;

/// Errors raised while fetching raw stat records from the management API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid management url: {0}")]
    InvalidUrl(String),

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("request to {uri} timed out after {millis}ms")]
    Timeout { uri: String, millis: u128 },

    #[error("request failed: {0}")]
    Request(String),

    #[error("authentication rejected by {uri} (status {status})")]
    Unauthorized { uri: String, status: u16 },

    #[error("unexpected status {status} from {uri}")]
    Status { uri: String, status: u16 },

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("failed to decode {domain} response: {reason}")]
    Decode { domain: String, reason: String },
}

/// Errors raised while loading or validating exporter configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
