//! Scrape regression tests.
//!
//! Wires the exporter the way `hutchd serve` does against an in-process
//! fake of the RabbitMQ management API, then scrapes `/metrics` through
//! the router.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower::ServiceExt;

use hutch_api::{build_router, ScrapeState};
use hutch_core::ExporterConfig;
use hutch_fetch::ManagementClient;
use hutch_metrics::{ExporterContext, ExporterRegistry, ExporterSet};

/// Successive bodies served by the fake management API; past the end it
/// answers 500.
#[derive(Clone)]
struct FakeApi {
    bodies: Arc<Vec<&'static str>>,
    served: Arc<AtomicUsize>,
}

async fn connections(State(api): State<FakeApi>) -> impl IntoResponse {
    let n = api.served.fetch_add(1, Ordering::SeqCst);
    match api.bodies.get(n) {
        Some(body) => (StatusCode::OK, [("content-type", "application/json")], *body).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn start_fake_api(bodies: Vec<&'static str>) -> SocketAddr {
    let api = FakeApi {
        bodies: Arc::new(bodies),
        served: Arc::new(AtomicUsize::new(0)),
    };
    let router = Router::new()
        .route("/api/connections", get(connections))
        .with_state(api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn exporter_router(api: SocketAddr, fail_on_error: bool) -> Router {
    let mut config = ExporterConfig::default();
    config.rabbit.url = format!("http://{api}");
    config.server.fail_on_error = fail_on_error;
    config.validate().unwrap();

    let client = ManagementClient::new(
        &config.rabbit.url,
        &config.rabbit.user,
        &config.rabbit.password,
        Duration::from_secs(2),
    )
    .unwrap();
    let ctx = ExporterContext {
        provider: Arc::new(client),
        namespace: config.server.namespace.clone(),
    };
    let exporters = ExporterSet::from_registry(
        &ExporterRegistry::builtin(),
        &config.exporters.enabled,
        &ctx,
        config.server.publish_stale_on_error,
    )
    .unwrap();

    build_router(ScrapeState {
        exporters: Arc::new(exporters),
        fail_on_error,
    })
}

async fn scrape(router: &Router) -> (StatusCode, String) {
    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

const TWO_CONNECTIONS_SAME_TUPLE: &str = r#"[
  {"vhost":"/","node":"n1","peer_host":"h1","user":"u1","state":"running","channels":2,"recv_oct":100},
  {"vhost":"/","node":"n1","peer_host":"h1","user":"u1","state":"running","channels":1,"recv_oct":50}
]"#;

const ONE_CONNECTION_NO_RECV: &str = r#"[
  {"vhost":"/","node":"n1","peer_host":"h2","user":"u1","state":"blocked","channels":1}
]"#;

#[tokio::test]
async fn scrape_sums_connections_per_tuple() {
    let api = start_fake_api(vec![TWO_CONNECTIONS_SAME_TUPLE]).await;
    let router = exporter_router(api, false);

    let (status, body) = scrape(&router).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(
        "rabbitmq_connection_channels{vhost=\"/\",node=\"n1\",peer_host=\"h1\",user=\"u1\"} 3\n"
    ));
    assert!(body.contains(
        "rabbitmq_connection_received_bytes{vhost=\"/\",node=\"n1\",peer_host=\"h1\",user=\"u1\"} 150\n"
    ));
    assert!(body.contains(
        "rabbitmq_connection_status{vhost=\"/\",node=\"n1\",peer_host=\"h1\",user=\"u1\",state=\"running\"} 2\n"
    ));
    assert!(body.contains("rabbitmq_up 1\n"));
    assert!(body.contains("rabbitmq_module_up{module=\"connections\"} 1\n"));
}

#[tokio::test]
async fn scrape_drops_vanished_connections() {
    let api = start_fake_api(vec![TWO_CONNECTIONS_SAME_TUPLE, ONE_CONNECTION_NO_RECV]).await;
    let router = exporter_router(api, false);

    scrape(&router).await;
    let (_, body) = scrape(&router).await;

    assert!(!body.contains("peer_host=\"h1\""));
    assert!(body.contains(
        "rabbitmq_connection_status{vhost=\"/\",node=\"n1\",peer_host=\"h2\",user=\"u1\",state=\"blocked\"} 1\n"
    ));
    // No recv_oct reported, so no received-bytes series for h2.
    assert!(!body.contains("rabbitmq_connection_received_bytes{"));
}

#[tokio::test]
async fn scrape_after_upstream_failure_serves_last_good_values() {
    let api = start_fake_api(vec![TWO_CONNECTIONS_SAME_TUPLE]).await;
    let router = exporter_router(api, false);

    scrape(&router).await;
    let (status, body) = scrape(&router).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("rabbitmq_up 0\n"));
    assert!(body.contains("rabbitmq_module_up{module=\"connections\"} 0\n"));
    assert!(body.contains(
        "rabbitmq_connection_channels{vhost=\"/\",node=\"n1\",peer_host=\"h1\",user=\"u1\"} 3\n"
    ));
}

#[tokio::test]
async fn scrape_fails_with_503_when_configured() {
    let api = start_fake_api(Vec::new()).await;
    let router = exporter_router(api, true);

    let (status, body) = scrape(&router).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("unexpected status 500"));
}

#[tokio::test]
async fn landing_page_is_served() {
    let api = start_fake_api(Vec::new()).await;
    let router = exporter_router(api, false);

    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
