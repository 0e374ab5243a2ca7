//! HTTP client for the RabbitMQ management API.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use http_body_util::BodyExt;
use tracing::debug;

use hutch_core::{ExporterConfig, FetchError, StatRecord, StatsProvider};

use crate::decode::records_from_json;

/// Fetches stat records from one management API endpoint.
#[derive(Debug, Clone)]
pub struct ManagementClient {
    /// `host:port` to connect to.
    address: String,
    /// Value for the `host` header.
    host_header: String,
    /// Path prefix when the API sits behind a reverse proxy, without a
    /// trailing slash.
    base_path: String,
    authorization: String,
    timeout: Duration,
}

impl ManagementClient {
    pub fn new(url: &str, user: &str, password: &str, timeout: Duration) -> Result<Self, FetchError> {
        let uri: http::Uri = url
            .parse()
            .map_err(|e| FetchError::InvalidUrl(format!("{url:?}: {e}")))?;

        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => return Err(FetchError::UnsupportedScheme(other.to_string())),
            None => return Err(FetchError::InvalidUrl(format!("{url:?}: missing scheme"))),
        }
        let host = uri
            .host()
            .ok_or_else(|| FetchError::InvalidUrl(format!("{url:?}: missing host")))?;
        let port = uri.port_u16().unwrap_or(80);

        let credentials = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));

        Ok(Self {
            address: format!("{host}:{port}"),
            host_header: uri
                .authority()
                .map(|a| a.to_string())
                .unwrap_or_else(|| host.to_string()),
            base_path: uri.path().trim_end_matches('/').to_string(),
            authorization: format!("Basic {credentials}"),
            timeout,
        })
    }

    pub fn from_config(config: &ExporterConfig) -> anyhow::Result<Self> {
        let timeout = config.timeout()?;
        Ok(Self::new(
            &config.rabbit.url,
            &config.rabbit.user,
            &config.rabbit.password,
            timeout,
        )?)
    }

    /// Request target for a domain, e.g. `/api/connections`.
    pub fn endpoint_path(&self, domain: &str) -> String {
        format!("{}/api/{domain}", self.base_path)
    }

    /// GET `/api/<domain>` and return the raw body.
    pub async fn get(&self, domain: &str) -> Result<bytes::Bytes, FetchError> {
        let path = self.endpoint_path(domain);
        let uri = format!("http://{}{path}", self.host_header);

        let result = tokio::time::timeout(self.timeout, self.send(&path, &uri)).await;
        match result {
            Ok(result) => result,
            Err(_) => {
                debug!(%uri, "management request timed out");
                Err(FetchError::Timeout {
                    uri,
                    millis: self.timeout.as_millis(),
                })
            }
        }
    }

    async fn send(&self, path: &str, uri: &str) -> Result<bytes::Bytes, FetchError> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| FetchError::Connect {
                address: self.address.clone(),
                reason: e.to_string(),
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| FetchError::Connect {
                address: self.address.clone(),
                reason: e.to_string(),
            })?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "management connection closed with error");
            }
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(path)
            .header("host", &self.host_header)
            .header("authorization", &self.authorization)
            .header("accept", "application/json")
            .header("user-agent", concat!("hutch/", env!("CARGO_PKG_VERSION")))
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = resp.status();
        if status == http::StatusCode::UNAUTHORIZED || status == http::StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized {
                uri: uri.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                uri: uri.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?
            .to_bytes();
        debug!(%uri, bytes = body.len(), "management response received");
        Ok(body)
    }
}

#[async_trait]
impl StatsProvider for ManagementClient {
    async fn fetch(&self, domain: &str, label_keys: &[&str]) -> Result<Vec<StatRecord>, FetchError> {
        let body = self.get(domain).await?;
        records_from_json(domain, &body, label_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;

    const LABELS: [&str; 5] = ["vhost", "node", "peer_host", "user", "state"];

    const BODY: &str = r#"[
      {"vhost":"/","node":"rabbit@mq-1","peer_host":"10.0.0.1","user":"guest","state":"running","channels":3,"recv_oct":100},
      {"vhost":"/","node":"rabbit@mq-1","peer_host":"10.0.0.2","user":"guest","state":"running","channels":1}
    ]"#;

    async fn connections(headers: HeaderMap) -> impl IntoResponse {
        // "guest:guest"
        let expected = "Basic Z3Vlc3Q6Z3Vlc3Q=";
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some(v) if v == expected => {
                (StatusCode::OK, [("content-type", "application/json")], BODY).into_response()
            }
            _ => StatusCode::UNAUTHORIZED.into_response(),
        }
    }

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn test_router() -> Router {
        Router::new()
            .route("/api/connections", get(connections))
            .route("/proxied/api/connections", get(connections))
            .route("/api/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route(
                "/api/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "[]"
                }),
            )
    }

    fn client(addr: SocketAddr, password: &str) -> ManagementClient {
        ManagementClient::new(&format!("http://{addr}"), "guest", password, Duration::from_secs(2))
            .unwrap()
    }

    #[test]
    fn new_parses_url() {
        let c = ManagementClient::new("http://mq.internal:15672/rabbit/", "u", "p", Duration::from_secs(1))
            .unwrap();
        assert_eq!(c.address, "mq.internal:15672");
        assert_eq!(c.host_header, "mq.internal:15672");
        assert_eq!(c.endpoint_path("connections"), "/rabbit/api/connections");
    }

    #[test]
    fn new_defaults_port_80() {
        let c = ManagementClient::new("http://mq", "u", "p", Duration::from_secs(1)).unwrap();
        assert_eq!(c.address, "mq:80");
        assert_eq!(c.endpoint_path("connections"), "/api/connections");
    }

    #[test]
    fn new_rejects_https_and_garbage() {
        assert!(matches!(
            ManagementClient::new("https://mq:15671", "u", "p", Duration::from_secs(1)),
            Err(FetchError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            ManagementClient::new("not a url", "u", "p", Duration::from_secs(1)),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn from_config_uses_rabbit_section() {
        let mut config = ExporterConfig::default();
        config.rabbit.url = "http://10.1.2.3:15672".to_string();
        config.rabbit.timeout = "750ms".to_string();
        let c = ManagementClient::from_config(&config).unwrap();
        assert_eq!(c.address, "10.1.2.3:15672");
        assert_eq!(c.timeout, Duration::from_millis(750));
    }

    #[tokio::test]
    async fn fetch_decodes_records() {
        let addr = serve(test_router()).await;
        let records = client(addr, "guest").fetch("connections", &LABELS).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].metric("channels"), Some(3.0));
        assert_eq!(records[1].label("peer_host"), "10.0.0.2");
    }

    #[tokio::test]
    async fn fetch_through_path_prefix() {
        let addr = serve(test_router()).await;
        let c = ManagementClient::new(
            &format!("http://{addr}/proxied/"),
            "guest",
            "guest",
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(c.fetch("connections", &LABELS).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let addr = serve(test_router()).await;
        let err = client(addr, "nope").fetch("connections", &LABELS).await.unwrap_err();
        assert!(matches!(err, FetchError::Unauthorized { status: 401, .. }));
    }

    #[tokio::test]
    async fn server_error_is_status_error() {
        let addr = serve(test_router()).await;
        let err = client(addr, "guest").fetch("broken", &LABELS).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let addr = serve(test_router()).await;
        let c = ManagementClient::new(
            &format!("http://{addr}"),
            "guest",
            "guest",
            Duration::from_millis(100),
        )
        .unwrap();
        let err = c.fetch("slow", &LABELS).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout { millis: 100, .. }));
    }

    #[tokio::test]
    async fn closed_port_is_connect_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(addr, "guest").fetch("connections", &LABELS).await.unwrap_err();
        assert!(matches!(err, FetchError::Connect { .. }));
    }
}
