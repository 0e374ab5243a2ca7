//! Scrape and landing page handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use tracing::warn;

use hutch_metrics::Exposition;

use crate::ScrapeState;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /
pub async fn index() -> impl IntoResponse {
    Html(
        "<html>\n\
         <head><title>RabbitMQ Exporter</title></head>\n\
         <body>\n\
         <h1>RabbitMQ Exporter</h1>\n\
         <p><a href=\"/metrics\">Metrics</a></p>\n\
         </body>\n\
         </html>\n",
    )
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ScrapeState>) -> impl IntoResponse {
    let mut exposition = Exposition::new();
    let report = state.exporters.collect(&mut exposition).await;

    if !report.all_up() && state.fail_on_error {
        warn!(failed = report.failures.len(), "scrape failed");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [("content-type", "text/plain; charset=utf-8")],
            format!("scrape failed\n{}\n", report.summary()),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [("content-type", EXPOSITION_CONTENT_TYPE)],
        exposition.render(),
    )
        .into_response()
}
