//! hutch-fetch — RabbitMQ management API client.
//!
//! Implements [`hutch_core::StatsProvider`] on top of a plain hyper HTTP/1
//! client: one GET per fetch against `<url>/api/<domain>`, authenticated
//! with HTTP basic auth and bounded by a request timeout.
//!
//! # Architecture
//!
//! ```text
//! ManagementClient::fetch(domain, label_keys)
//!   ├── get(domain) → GET /api/<domain> → response body
//!   └── decode::records_from_json() → Vec<StatRecord>
//!         ├── numbers / booleans → metrics (nested keys joined with '.')
//!         └── strings named in label_keys → labels ("" when missing)
//! ```

pub mod client;
pub mod decode;

pub use client::ManagementClient;
pub use decode::records_from_json;
