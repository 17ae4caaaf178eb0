//! Webhook payload verification and event decoding.
//!
//! Inbound webhook bodies are authenticated with an HMAC-SHA256 over the
//! raw bytes, keyed by the endpoint's shared secret. Verification happens
//! strictly before any JSON decoding: an unverified payload never yields
//! parsed event data.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::warn;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// One webhook event record.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event id.
    pub id: String,
    /// When the event was created.
    pub created_at: DateTime<Utc>,
    /// Resource type the event concerns, e.g. `payments`.
    pub resource_type: String,
    /// What happened, e.g. `confirmed`.
    pub action: String,
    /// Relation name to related-resource id.
    #[serde(default)]
    pub links: HashMap<String, String>,
    /// Cause and origin details.
    #[serde(default)]
    pub details: Value,
    /// Key-value metadata attached to the resource.
    #[serde(default)]
    pub metadata: Value,
}

/// Wire envelope: `{"events": [...]}`.
#[derive(Deserialize)]
struct EventEnvelope {
    events: Vec<Event>,
}

/// Verifies webhook payloads against an endpoint's shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Creates a verifier for one endpoint's shared secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Verifies and decodes a webhook payload.
    ///
    /// `signature_header` is the lower-case hex HMAC carried in the
    /// request's signature header. The comparison is constant-time, and
    /// no JSON decoding happens before it passes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] on any signature mismatch
    /// (including a non-hex header), and [`Error::WebhookPayload`] if a
    /// verified body cannot be decoded into events.
    pub fn parse(&self, body: &[u8], signature_header: &str) -> Result<Vec<Event>> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| Error::InvalidSignature)?;
        mac.update(body);

        let provided =
            hex::decode(signature_header.trim()).map_err(|_| Error::InvalidSignature)?;
        mac.verify_slice(&provided).map_err(|_| {
            warn!("webhook signature mismatch");
            Error::InvalidSignature
        })?;

        let envelope: EventEnvelope =
            serde_json::from_slice(body).map_err(Error::WebhookPayload)?;
        Ok(envelope.events)
    }

    /// Lower-case hex HMAC for a body, as the service computes it.
    ///
    /// Useful for signing test fixtures and local tooling.
    #[must_use]
    pub fn signature_for(&self, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }
}
