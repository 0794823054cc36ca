//! JSON-over-HTTP transport for pipeline stages.
//!
//! A [`Transport`] issues exactly one request and classifies the outcome into
//! a parsed JSON body or a [`StageError`]. It never retries and holds no
//! per-run state, so one instance can serve many runs.

use std::future::Future;
use std::time::Duration;

use graphrag_shared::{ClientConfig, GraphRagError, Result, StageError};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

/// User-Agent string for backend requests.
const USER_AGENT: &str = concat!("graphrag-client/", env!("CARGO_PKG_VERSION"));

/// Body fields that conventionally carry an error description.
const ERROR_DETAIL_FIELDS: [&str; 3] = ["detail", "error", "message"];

/// Result of a single transport call.
pub type StageResult = std::result::Result<Value, StageError>;

/// HTTP method of a stage call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Sends one request to a logical endpoint.
pub trait Transport: Send + Sync {
    /// Issue `method endpoint` with an optional JSON body.
    ///
    /// `timeout` bounds the whole exchange, body included.
    fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> impl Future<Output = StageResult> + Send;
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// `reqwest`-backed transport resolving endpoints against a base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build a transport for `base_url`.
    pub fn new(base_url: Url) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url,
        })
    }

    /// Build a transport from the resolved client config.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(config.base_url.clone())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a logical endpoint into a concrete URL.
    ///
    /// Absolute URLs are used as-is; paths are joined onto the base URL.
    pub fn resolve(&self, endpoint: &str) -> std::result::Result<Url, StageError> {
        self.base_url.join(endpoint).map_err(|e| StageError::Network {
            endpoint: endpoint.to_string(),
            detail: format!("cannot resolve endpoint against {}: {e}", self.base_url),
        })
    }

    /// `GET` a service health endpoint.
    pub async fn health(&self, endpoint: &str, timeout: Duration) -> StageResult {
        self.send(Method::Get, endpoint, None, Some(timeout)).await
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self, body, timeout))]
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> StageResult {
        let url = self.resolve(endpoint)?;
        debug!(%url, "sending stage request");

        let mut request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_reqwest_error(endpoint, &e, timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(endpoint, &e, timeout))?;

        if !status.is_success() {
            let detail = error_detail(&text).unwrap_or_else(|| status_text(status));
            debug!(status = status.as_u16(), %detail, "stage request rejected");
            return Err(StageError::ServerError {
                status: status.as_u16(),
                detail,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            debug!(error = %e, "response body is not JSON");
            StageError::missing("json body")
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(|e| GraphRagError::Network(format!("failed to build HTTP client: {e}")))
}

/// Map a reqwest failure (no usable HTTP response) into a stage error.
fn classify_reqwest_error(
    endpoint: &str,
    err: &reqwest::Error,
    timeout: Option<Duration>,
) -> StageError {
    if err.is_timeout() {
        StageError::Timeout {
            timeout_ms: timeout.map_or(0, |t| t.as_millis() as u64),
        }
    } else {
        StageError::Network {
            endpoint: endpoint.to_string(),
            detail: err.to_string(),
        }
    }
}

/// Pull a human-readable message out of an error body, if it has one.
pub fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ERROR_DETAIL_FIELDS.iter().find_map(|field| {
        value
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport_for(server: &wiremock::MockServer) -> HttpTransport {
        HttpTransport::new(Url::parse(&server.uri()).unwrap()).unwrap()
    }

    #[test]
    fn test_resolve_relative_path() {
        let t = HttpTransport::new(Url::parse("http://localhost:8080/").unwrap()).unwrap();
        assert_eq!(
            t.resolve("/api/search").unwrap().as_str(),
            "http://localhost:8080/api/search"
        );
    }

    #[test]
    fn test_resolve_absolute_endpoint() {
        let t = HttpTransport::new(Url::parse("http://localhost:8080/").unwrap()).unwrap();
        assert_eq!(
            t.resolve("http://analysis:8002/analyze").unwrap().as_str(),
            "http://analysis:8002/analyze"
        );
    }

    #[test]
    fn test_error_detail_prefers_detail_field() {
        assert_eq!(
            error_detail(r#"{"detail": "model not loaded", "error": "x"}"#),
            Some("model not loaded".into())
        );
        assert_eq!(error_detail(r#"{"error": "boom"}"#), Some("boom".into()));
        assert_eq!(error_detail(r#"{"detail": [{"loc": ["body"]}]}"#), None);
        assert_eq!(error_detail("<html>502</html>"), None);
    }

    #[tokio::test]
    async fn test_post_returns_parsed_json() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/api/search"))
            .and(wiremock::matchers::body_json(json!({"query": "rust"})))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(json!({"results": [{"title": "Rust"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let body = json!({"query": "rust"});
        let result = transport_for(&server)
            .send(Method::Post, "/api/search", Some(&body), None)
            .await
            .unwrap();

        assert_eq!(result["results"][0]["title"], "Rust");
    }

    #[tokio::test]
    async fn test_server_error_uses_detail_field() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/api/analyze"))
            .respond_with(
                wiremock::ResponseTemplate::new(500)
                    .set_body_json(json!({"detail": "neo4j is unavailable"})),
            )
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .send(Method::Post, "/api/analyze", Some(&json!({})), None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StageError::ServerError {
                status: 500,
                detail: "neo4j is unavailable".into()
            }
        );
    }

    #[tokio::test]
    async fn test_server_error_falls_back_to_status_text() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .send(Method::Post, "/api/orchestrate", Some(&json!({})), None)
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Service Unavailable");
    }

    #[tokio::test]
    async fn test_non_json_success_is_malformed() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .send(Method::Post, "/api/search", Some(&json!({})), None)
            .await
            .unwrap_err();

        assert_eq!(err, StageError::missing("json body"));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(json!({"results": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .send(
                Method::Post,
                "/api/search",
                Some(&json!({})),
                Some(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();

        assert_eq!(err, StageError::Timeout { timeout_ms: 50 });
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let base = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
        let transport = HttpTransport::new(base).unwrap();

        let err = transport
            .send(Method::Post, "/api/search", Some(&json!({})), None)
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Network { ref endpoint, .. } if endpoint == "/api/search"));
        assert_eq!(err.user_message(), "could not reach the server");
    }

    #[tokio::test]
    async fn test_health_uses_get() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/api/health"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "healthy", "service": "analysis_agent"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let health = transport_for(&server)
            .health("/api/health", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(health["status"], "healthy");
    }
}
