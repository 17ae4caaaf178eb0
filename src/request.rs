//! Request descriptors, per-call settings, and decoded responses.
//!
//! Resource services describe one logical call with a
//! [`RequestDescriptor`]; callers adjust individual calls with
//! [`RequestSettings`]. Both are consumed by the
//! [`RequestExecutor`](crate::RequestExecutor).

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::query::{QueryParams, encode_component};
use crate::transport::{HttpRequest, Method};

/// Describes one logical API call.
///
/// Immutable once handed to the executor: path substitution and
/// query-string construction produce identical results across every retry
/// of the call.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method.
    pub method: Method,
    /// Path template with `:name` placeholders, e.g. `/payments/:id`.
    pub path: String,
    /// Ordered placeholder substitutions.
    pub path_params: Vec<(&'static str, String)>,
    /// Declared query fields, for methods without a body.
    pub query: QueryParams,
    /// JSON request body, for methods with a body.
    pub body: Option<Value>,
    /// Key the body is wrapped under, e.g. `payments`. `None` sends the
    /// body unwrapped.
    pub envelope: Option<&'static str>,
    /// Whether this request type requires an idempotency key.
    pub idempotent: bool,
}

impl RequestDescriptor {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: Vec::new(),
            query: QueryParams::new(),
            body: None,
            envelope: None,
            idempotent: false,
        }
    }

    /// Describes a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Describes a POST request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Describes a PUT request.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// Describes a DELETE request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Substitutes a `:name` placeholder in the path template.
    #[must_use]
    pub fn path_param(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.path_params.push((name, value.into()));
        self
    }

    /// Declares the query fields.
    #[must_use]
    pub fn query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Sets the JSON request body.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Wraps the body under a payload key, e.g. `{"payments": {...}}`.
    #[must_use]
    pub fn envelope(mut self, key: &'static str) -> Self {
        self.envelope = Some(key);
        self
    }

    /// Marks the request type as requiring an idempotency key.
    #[must_use]
    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    /// Path with placeholders substituted and values percent-encoded.
    pub(crate) fn resolved_path(&self) -> String {
        let mut path = self.path.clone();
        for (name, value) in &self.path_params {
            path = path.replace(&format!(":{name}"), &encode_component(value));
        }
        path
    }
}

/// Hook that mutates a built request just before signing and sending.
pub type RequestHook = Box<dyn Fn(&mut HttpRequest) + Send + Sync>;

/// Per-call overrides layered on top of [`ClientConfig`](crate::ClientConfig).
#[derive(Default)]
pub struct RequestSettings {
    /// Headers replacing (not merging with) same-named default headers.
    pub headers: Vec<(String, String)>,
    /// Explicit idempotency key. Generated when absent and required.
    pub idempotency_key: Option<String>,
    /// Retry-count override.
    pub max_retries: Option<u32>,
    /// Inter-retry delay override.
    pub retry_delay: Option<Duration>,
    /// Deadline for the whole logical call, retries included. Terminal
    /// when elapsed.
    pub deadline: Option<Duration>,
    /// Final, highest-precedence request customization point, applied
    /// after all default construction and header overrides.
    pub customize: Option<RequestHook>,
}

impl RequestSettings {
    /// Creates empty settings: every default applies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header override.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Supplies the idempotency key instead of generating one.
    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Overrides the retry count for this call.
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Overrides the inter-retry delay for this call.
    #[must_use]
    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }

    /// Bounds the whole logical call.
    #[must_use]
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Installs the request mutation hook.
    #[must_use]
    pub fn customize(mut self, hook: impl Fn(&mut HttpRequest) + Send + Sync + 'static) -> Self {
        self.customize = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for RequestSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSettings")
            .field("headers", &self.headers)
            .field("idempotency_key", &self.idempotency_key)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("deadline", &self.deadline)
            .field("customize", &self.customize.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

/// A decoded API response plus the raw transport response for inspection.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The decoded resource. Empty or `null` bodies decode to
    /// `T::default()`.
    pub resource: T,
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Raw response body bytes.
    pub body: Vec<u8>,
}

impl<T> ApiResponse<T> {
    /// Looks up a response header value, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
