//! HTTP transport abstraction.
//!
//! The executor speaks to the network through the [`Transport`] trait so
//! that the retry and classification logic stays independent of any
//! particular HTTP stack. [`HttpTransport`] is the production
//! implementation over reqwest; tests inject scripted transports to
//! exercise the executor's failure handling.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::error::{Error, Result};

/// Default HTTP client with connection pooling enabled.
///
/// Using a singleton avoids recreating the client per transport instance,
/// preserving connection pooling benefits across all default transports.
static DEFAULT_HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .pool_max_idle_per_host(100)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to create default HTTP client")
});

/// HTTP method of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET: parameters travel in the query string.
    Get,
    /// POST: parameters travel in the JSON body.
    Post,
    /// PUT: parameters travel in the JSON body.
    Put,
    /// DELETE: parameters travel in the query string.
    Delete,
}

impl Method {
    /// Uppercase method name, as it appears on the wire and in signatures.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether request parameters are carried in a JSON body.
    #[must_use]
    pub const fn allows_body(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Delete => Self::DELETE,
        }
    }
}

/// A fully built outbound request, ready for one send attempt.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL, query string included.
    pub url: Url,
    /// Headers in application order. Names are unique; see
    /// [`set_header`](Self::set_header).
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body, if the request carries one.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates an empty request for `method` and `url`.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: Vec::new(), body: None }
    }

    /// Sets a header, replacing any same-named header.
    ///
    /// Replacement is case-insensitive, so a settings override of
    /// `idempotency-key` displaces the default `Idempotency-Key`.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// Looks up a header value, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Authority component for signing: host plus any explicit port.
    #[must_use]
    pub fn authority(&self) -> Option<String> {
        let host = self.url.host_str()?;
        Some(match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        })
    }

    /// Request target component for signing: path plus query string.
    #[must_use]
    pub fn request_target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{query}", self.url.path()),
            None => self.url.path().to_owned(),
        }
    }
}

/// A raw HTTP response as seen by the executor.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Raw response body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up a header value, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Transport-level failures, partitioned by retryability.
///
/// [`Timeout`](Self::Timeout) and [`Connect`](Self::Connect) are the only
/// failure classes the executor retries; everything else propagates
/// immediately.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete within the transport's timeout.
    #[error("request timed out: {0}")]
    Timeout(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The connection could not be established (DNS, TLS, network).
    #[error("connection failed: {0}")]
    Connect(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Any other transport failure. Never retried.
    #[error("transport failure: {0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Whether the executor may retry after this failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connect(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(Box::new(error))
        } else if error.is_connect() {
            Self::Connect(Box::new(error))
        } else {
            Self::Other(Box::new(error))
        }
    }
}

/// Sends one built request and returns the raw response.
///
/// Implementations must be safe to invoke concurrently from independent
/// calls; the executor itself never issues concurrent attempts for a
/// single logical call.
pub trait Transport: Send + Sync {
    /// Executes a single HTTP attempt.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if no HTTP response was produced.
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = std::result::Result<HttpResponse, TransportError>> + Send;
}

/// HTTP transport over reqwest with connection pooling.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    /// Creates a transport backed by the shared pooled client.
    #[must_use]
    pub fn new() -> Self {
        Self { client: DEFAULT_HTTP_CLIENT.clone() }
    }

    /// Creates a transport with custom pool and timeout settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is out of bounds or
    /// the HTTP client cannot be built.
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Executes one attempt over reqwest.
    #[instrument(skip_all, fields(method = request.method.as_str(), url = %request.url))]
    async fn execute(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let mut builder = self.client.request(request.method.into(), request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_owned()))
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status, headers, body })
    }
}

impl Transport for HttpTransport {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.execute(request).await
    }
}

/// HTTP transport configuration.
///
/// Deserializable so applications can load it from TOML alongside their
/// own settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Maximum idle connections per host.
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: default_pool_max_idle(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl HttpConfig {
    /// Validates configuration values are within acceptable bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if timeout values are outside valid
    /// ranges: `timeout_secs` must be 1-300 seconds and
    /// `connect_timeout_secs` must be 1-60 seconds.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(Error::Config("timeout_secs must be between 1 and 300".to_owned()));
        }
        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 60 {
            return Err(Error::Config(
                "connect_timeout_secs must be between 1 and 60".to_owned(),
            ));
        }
        Ok(())
    }

    /// Returns timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns connect timeout as Duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_pool_max_idle() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> HttpRequest {
        HttpRequest::new(Method::Get, Url::parse("https://api.gatecharge.com/payments").unwrap())
    }

    #[test]
    fn test_set_header_replaces_same_named() {
        let mut request = request();
        request.set_header("Gc-Version", "2024-11-01");
        request.set_header("gc-version", "2023-01-01");

        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("Gc-Version"), Some("2023-01-01"));
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let mut request = request();
        request.set_header("Idempotency-Key", "key-1");
        assert_eq!(request.header("idempotency-key"), Some("key-1"));
        assert_eq!(request.header("Accept"), None);
    }

    #[test]
    fn test_authority_without_explicit_port() {
        assert_eq!(request().authority().as_deref(), Some("api.gatecharge.com"));
    }

    #[test]
    fn test_authority_with_explicit_port() {
        let request = HttpRequest::new(
            Method::Get,
            Url::parse("https://api.gatecharge.com:8443/payments").unwrap(),
        );
        assert_eq!(request.authority().as_deref(), Some("api.gatecharge.com:8443"));
    }

    #[test]
    fn test_request_target_includes_query() {
        let request = HttpRequest::new(
            Method::Get,
            Url::parse("https://api.gatecharge.com/payments?limit=10").unwrap(),
        );
        assert_eq!(request.request_target(), "/payments?limit=10");
    }

    #[test]
    fn test_request_target_without_query() {
        assert_eq!(request().request_target(), "/payments");
    }

    #[test]
    fn test_response_is_success() {
        let mut response = HttpResponse { status: 200, headers: vec![], body: vec![] };
        assert!(response.is_success());
        response.status = 204;
        assert!(response.is_success());
        response.status = 409;
        assert!(!response.is_success());
        response.status = 199;
        assert!(!response.is_success());
    }

    #[test]
    fn test_transport_error_retryability() {
        let timeout = TransportError::Timeout(Box::new(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "deadline elapsed",
        )));
        let connect = TransportError::Connect(Box::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )));
        let other = TransportError::Other(Box::new(std::io::Error::other("body error")));

        assert!(timeout.is_retryable());
        assert!(connect.is_retryable());
        assert!(!other.is_retryable());
    }

    #[test]
    fn test_method_as_str() {
        assert_eq!(Method::Get.as_str(), "GET");
        assert_eq!(Method::Post.as_str(), "POST");
        assert_eq!(Method::Put.as_str(), "PUT");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }

    #[test]
    fn test_method_allows_body() {
        assert!(!Method::Get.allows_body());
        assert!(Method::Post.allows_body());
        assert!(Method::Put.allows_body());
        assert!(!Method::Delete.allows_body());
    }

    #[test]
    fn test_http_config_default() {
        let config = HttpConfig::default();
        assert_eq!(config.pool_max_idle_per_host, 100);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_config_from_toml_with_defaults() {
        let toml = "timeout_secs = 60";
        let config: HttpConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.pool_max_idle_per_host, 100); // default
        assert_eq!(config.connect_timeout_secs, 10); // default
    }

    #[test]
    fn test_http_config_validate_bounds() {
        let config = HttpConfig { timeout_secs: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = HttpConfig { timeout_secs: 301, ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = HttpConfig { connect_timeout_secs: 61, ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config =
            HttpConfig { timeout_secs: 300, connect_timeout_secs: 60, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_transport_with_invalid_config() {
        let config = HttpConfig { timeout_secs: 0, ..Default::default() };
        assert!(HttpTransport::with_config(&config).is_err());
    }

    #[test]
    fn test_http_transport_with_valid_config() {
        let config = HttpConfig { pool_max_idle_per_host: 20, ..Default::default() };
        assert!(HttpTransport::with_config(&config).is_ok());
    }
}
