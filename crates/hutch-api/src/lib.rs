//! hutch-api — HTTP surface of the exporter.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Landing page linking to `/metrics` |
//! | GET | `/metrics` | Prometheus exposition (one collection cycle per request) |

pub mod handlers;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use hutch_metrics::ExporterSet;

/// Shared state for scrape handlers.
#[derive(Clone)]
pub struct ScrapeState {
    pub exporters: Arc<ExporterSet>,
    /// Answer 503 when any module fails instead of 200 with `up 0`.
    pub fail_on_error: bool,
}

/// Build the exporter's router.
pub fn build_router(state: ScrapeState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/metrics", get(handlers::prometheus_metrics))
        .with_state(state)
}
