//! Error types for the GateCharge client.
//!
//! All errors implement the standard [`std::error::Error`] trait via
//! [`thiserror::Error`]. API failures carry the full decoded
//! [`ApiErrorResponse`] so integrators can inspect the status code, error
//! type, human message, and field-level sub-errors programmatically.
//!
//! # Error Categories
//!
//! - **API errors** ([`Error::AuthenticationFailed`] through
//!   [`Error::Internal`]): the service returned a structured error body;
//!   the variant is derived from the wire `type` refined by the HTTP
//!   status code.
//! - **Transport errors** ([`Error::Transport`]): the request never
//!   produced an HTTP response (timeout, connection failure, or another
//!   transport-level fault).
//! - **Decode errors** ([`Error::MalformedResponse`]): the service (or an
//!   intermediary) returned a body that is not the expected JSON shape.
//! - **Signing errors** ([`Error::SigningKey`], [`Error::Signing`],
//!   [`Error::SignatureVerification`]): request-signature configuration
//!   or verification failures.
//! - **Webhook errors** ([`Error::InvalidSignature`],
//!   [`Error::WebhookPayload`]): inbound payload verification failures.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fixed diagnostic attached when a response body cannot be decoded.
///
/// Intermediaries (load balancers, CDNs) occasionally answer with HTML or
/// plain text; the raw body is preserved alongside this message.
pub(crate) const MALFORMED_RESPONSE_MESSAGE: &str =
    "something went wrong with this request, the response body could not be decoded";

/// Errors that can occur while executing API calls or verifying webhooks.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum Error {
    /// The access token was missing, expired, or rejected (HTTP 401).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(ApiErrorResponse),

    /// The token is valid but not allowed to perform this action (HTTP 403).
    #[error("insufficient permissions: {0}")]
    InsufficientPermissions(ApiErrorResponse),

    /// Too many requests in the current window (HTTP 429).
    #[error("rate limit reached: {0}")]
    RateLimitReached(ApiErrorResponse),

    /// The request was well-formed but used the API incorrectly.
    #[error("invalid API usage: {0}")]
    InvalidApiUsage(ApiErrorResponse),

    /// The resource is not in a state that allows the requested action.
    ///
    /// Includes the idempotent-creation conflict, which the executor
    /// resolves transparently unless the client configuration opts into
    /// strict conflict reporting.
    #[error("invalid resource state: {0}")]
    InvalidState(ApiErrorResponse),

    /// One or more request fields failed validation (HTTP 422).
    ///
    /// [`ApiErrorResponse::errors`] carries the per-field details.
    #[error("validation failed: {0}")]
    ValidationFailed(ApiErrorResponse),

    /// The service reported an internal failure with a structured body.
    #[error("internal API error: {0}")]
    Internal(ApiErrorResponse),

    /// The response body could not be decoded as the expected JSON shape.
    ///
    /// `body` holds the raw response text unchanged for inspection.
    #[error("malformed API response (status {status}): {message}")]
    MalformedResponse {
        /// HTTP status code of the undecodable response.
        status: u16,
        /// Raw response body, unchanged.
        body: String,
        /// Fixed diagnostic message.
        message: &'static str,
    },

    /// The HTTP transport failed before a response was produced.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A webhook payload's HMAC signature did not match.
    #[error("webhook signature mismatch")]
    InvalidSignature,

    /// A verified webhook payload could not be decoded into events.
    #[error("failed to decode webhook payload: {0}")]
    WebhookPayload(#[source] serde_json::Error),

    /// The configured signing key is not usable.
    ///
    /// Raised at signer construction, so a malformed PEM key fails fast
    /// with a configuration error rather than a per-request crypto error.
    #[error("invalid signing key: {0}")]
    SigningKey(String),

    /// Producing a request signature failed.
    #[error("request signing failed: {0}")]
    Signing(String),

    /// A signature did not verify against the supplied public key and base.
    #[error("signature verification failed")]
    SignatureVerification,

    /// The caller-supplied deadline elapsed before the call completed.
    ///
    /// Terminal: the in-flight attempt is abandoned and no further
    /// retries are made.
    #[error("request deadline elapsed")]
    DeadlineElapsed,

    /// The request could not be constructed from the supplied descriptor.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The client configuration is invalid.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status code of the failure, when one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthenticationFailed(response)
            | Self::InsufficientPermissions(response)
            | Self::RateLimitReached(response)
            | Self::InvalidApiUsage(response)
            | Self::InvalidState(response)
            | Self::ValidationFailed(response)
            | Self::Internal(response) => Some(response.code),
            Self::MalformedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Structured error body, when the service returned one.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiErrorResponse> {
        match self {
            Self::AuthenticationFailed(response)
            | Self::InsufficientPermissions(response)
            | Self::RateLimitReached(response)
            | Self::InvalidApiUsage(response)
            | Self::InvalidState(response)
            | Self::ValidationFailed(response)
            | Self::Internal(response) => Some(response),
            _ => None,
        }
    }
}

/// Wire envelope around an error body: `{"error": {...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorEnvelope {
    pub error: ApiErrorResponse,
}

/// Structured error body returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// HTTP status code echoed in the body.
    pub code: u16,
    /// Error category declared by the service.
    #[serde(rename = "type")]
    pub kind: ApiErrorType,
    /// Human-readable summary.
    pub message: String,
    /// Identifier of the failed request, for support correspondence.
    #[serde(default)]
    pub request_id: Option<String>,
    /// Link to the relevant API documentation.
    #[serde(default)]
    pub documentation_url: Option<String>,
    /// Field- and reason-level sub-errors.
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

impl ApiErrorResponse {
    /// Id of the resource already created under the same idempotency key.
    ///
    /// Present only on invalid-state errors whose reason is
    /// `idempotent_creation_conflict`.
    #[must_use]
    pub fn conflicting_resource_id(&self) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.reason.as_deref() == Some("idempotent_creation_conflict"))
            .and_then(|error| error.links.get("conflicting_resource_id"))
            .map(String::as_str)
    }
}

impl fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status {})", self.message, self.code)?;
        if let Some(request_id) = &self.request_id {
            write!(f, " [request id {request_id}]")?;
        }
        Ok(())
    }
}

/// A single field- or reason-level error inside an [`ApiErrorResponse`].
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Machine-readable reason, e.g. `idempotent_creation_conflict`.
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable detail.
    #[serde(default)]
    pub message: String,
    /// Name of the offending field, for validation errors.
    #[serde(default)]
    pub field: Option<String>,
    /// JSON pointer into the request body, for validation errors.
    #[serde(default)]
    pub request_pointer: Option<String>,
    /// Relation name to related-resource id, e.g. the conflicting resource.
    #[serde(default)]
    pub links: HashMap<String, String>,
}

/// Error category carried in the wire `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    /// The request used the API incorrectly.
    InvalidApiUsage,
    /// The resource is not in a state that allows the action.
    InvalidState,
    /// Request fields failed validation.
    ValidationFailed,
    /// The service failed internally.
    InternalError,
    /// A type this client version does not know about.
    #[serde(other)]
    Unknown,
}

/// Maps a decoded error body and HTTP status to a typed [`Error`].
///
/// The wire `type` is the primary discriminant; the status code corrects
/// it when the declared type is coarser than the status implies (401,
/// 403, and 429 each have a dedicated category).
pub(crate) fn classify(status: u16, response: ApiErrorResponse) -> Error {
    match status {
        401 => return Error::AuthenticationFailed(response),
        403 => return Error::InsufficientPermissions(response),
        429 => return Error::RateLimitReached(response),
        _ => {}
    }

    match response.kind {
        ApiErrorType::InvalidState => Error::InvalidState(response),
        ApiErrorType::ValidationFailed => Error::ValidationFailed(response),
        ApiErrorType::InternalError => Error::Internal(response),
        ApiErrorType::InvalidApiUsage => Error::InvalidApiUsage(response),
        ApiErrorType::Unknown if status >= 500 => Error::Internal(response),
        ApiErrorType::Unknown => Error::InvalidApiUsage(response),
    }
}
