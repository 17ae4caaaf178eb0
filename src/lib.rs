//! GateCharge API client: request execution, signing, and webhooks.
//!
//! This crate is the execution engine under a GateCharge integration. It
//! turns one logical API call into zero or more HTTP attempts, handling
//! transient-failure retries, idempotency-key stability across those
//! retries, transparent reconciliation of idempotent-creation conflicts,
//! classification of error responses into a typed taxonomy, and optional
//! asymmetric HTTP message signing. A sibling [`webhook`] module verifies
//! inbound webhook payloads.
//!
//! Per-resource request/response types and endpoint catalogs are not part
//! of this crate: resource services describe calls with a
//! [`RequestDescriptor`] and decode responses into their own types.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │  Resource service  │  builds a RequestDescriptor per endpoint
//! └─────────┬──────────┘
//!           │
//! ┌─────────▼──────────────────────────────────────┐
//! │          RequestExecutor (this crate)          │
//! │  ┌───────────────┐      ┌──────────────────┐   │
//! │  │  Retry loop   │──────│  RequestSigner   │   │
//! │  │  + conflict   │      │  (ECDSA P-521 /  │   │
//! │  │  resolution   │      │   SHA-512)       │   │
//! │  └───────┬───────┘      └──────────────────┘   │
//! │          │  typed errors via the classifier    │
//! └──────────┼─────────────────────────────────────┘
//!            │ HTTPS (reqwest transport)
//! ┌──────────▼─────────┐
//! │   GateCharge API   │
//! └────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gatecharge::{ClientConfig, RequestDescriptor, RequestExecutor, RequestSettings};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct Payment {
//!     id: String,
//!     status: String,
//! }
//!
//! # async fn example() -> gatecharge::Result<()> {
//! let config = ClientConfig::new("https://api.gatecharge.com", "live_access_token")?;
//! let executor = RequestExecutor::new(config)?;
//!
//! let descriptor = RequestDescriptor::get("/payments/:id").path_param("id", "PM00123");
//! let response = executor
//!     .execute::<Payment>(descriptor, RequestSettings::new(), None)
//!     .await?;
//!
//! println!("payment {} is {}", response.resource.id, response.resource.status);
//! # Ok(())
//! # }
//! ```
//!
//! Creations carry an idempotency key, generated once per logical call
//! and held stable across every retry:
//!
//! ```rust,no_run
//! use gatecharge::{RequestDescriptor, RequestSettings};
//!
//! let descriptor = RequestDescriptor::post("/payments")
//!     .body(serde_json::json!({"amount": 1000, "currency": "GBP"}))
//!     .envelope("payments")
//!     .idempotent();
//! let settings = RequestSettings::new().idempotency_key("order-44-payment");
//! ```
//!
//! # Webhooks
//!
//! ```rust
//! use gatecharge::WebhookVerifier;
//!
//! let verifier = WebhookVerifier::new("endpoint_secret");
//! let body = br#"{"events":[]}"#;
//! let signature = verifier.signature_for(body);
//!
//! let events = verifier.parse(body, &signature).unwrap();
//! assert!(events.is_empty());
//! ```
//!
//! # Module Organization
//!
//! - [`executor`]: the retry loop, idempotency handling, and conflict
//!   resolution
//! - [`request`]: request descriptors, per-call settings, decoded
//!   responses
//! - [`signing`]: HTTP message signatures and verification
//! - [`webhook`]: inbound payload verification and event decoding
//! - [`error`]: the typed error taxonomy
//! - [`config`]: process-wide client configuration
//! - [`transport`]: the transport abstraction and reqwest adapter
//! - [`query`]: declarative query-string construction
//!
//! # Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Classified API
//! errors expose the status code, error type, message, and field-level
//! sub-errors:
//!
//! ```rust,no_run
//! use gatecharge::Error;
//!
//! # fn handle(error: Error) {
//! match error {
//!     Error::RateLimitReached(api) => {
//!         eprintln!("rate limited, request id {:?}", api.request_id);
//!     }
//!     Error::ValidationFailed(api) => {
//!         for field_error in &api.errors {
//!             eprintln!("{:?}: {}", field_error.field, field_error.message);
//!         }
//!     }
//!     Error::Transport(e) => eprintln!("network failure: {e}"),
//!     other => eprintln!("request failed: {other}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod query;
pub mod request;
pub mod signing;
pub mod transport;
pub mod webhook;

pub use config::{ClientConfig, SigningConfig};
pub use error::{ApiError, ApiErrorResponse, ApiErrorType, Error, Result};
pub use executor::{ConflictResolver, RequestExecutor};
pub use query::{QueryParams, QueryValue};
pub use request::{ApiResponse, RequestDescriptor, RequestHook, RequestSettings};
pub use signing::{RequestSigner, SignatureParams, content_digest, verify_signature};
pub use transport::{
    HttpConfig, HttpRequest, HttpResponse, HttpTransport, Method, Transport, TransportError,
};
pub use webhook::{Event, WebhookVerifier};
