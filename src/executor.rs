//! Request execution: retries, idempotency, and conflict resolution.
//!
//! One logical API call becomes one or more HTTP attempts. Transient
//! transport failures (timeout, connection) are retried with a fixed
//! delay and an unchanged idempotency key; classified API errors
//! propagate immediately, except the idempotent-creation conflict, which
//! is resolved by fetching the already-created resource.
//!
//! Each attempt's outcome is an explicit [`Attempt`] value the retry loop
//! pattern-matches on, keeping the policy declarative and testable.

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{ApiErrorEnvelope, Error, MALFORMED_RESPONSE_MESSAGE, Result, classify};
use crate::request::{ApiResponse, RequestDescriptor, RequestSettings};
use crate::signing::RequestSigner;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Transport};

/// Header carrying the idempotency key.
pub(crate) const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Header identifying this client library.
const CLIENT_LIBRARY_HEADER: &str = "Gc-Client-Library";

/// Header pinning the API version.
const VERSION_HEADER: &str = "Gc-Version";

/// Client identification value.
const CLIENT_LIBRARY: &str = concat!("gatecharge-rust/", env!("CARGO_PKG_VERSION"));

/// Caller-supplied fetch of the resource already created under the same
/// idempotency key.
///
/// Invoked at most once per logical call, with the conflicting resource
/// id extracted from the error body. Its own failure is terminal.
pub type ConflictResolver<'a, T> =
    Box<dyn FnOnce(String) -> BoxFuture<'a, Result<ApiResponse<T>>> + Send + 'a>;

/// Outcome of a single HTTP attempt.
enum Attempt<T> {
    /// 2xx response, decoded.
    Success(ApiResponse<T>),
    /// Retryable transport failure (timeout or connection).
    Retry(Error),
    /// Idempotent-creation conflict, eligible for resolution.
    Conflict {
        /// Id of the already-created resource.
        resource_id: String,
        /// The classified error, raised when no resolver is supplied.
        error: Error,
    },
    /// Terminal failure: classified API error, undecodable body, or a
    /// non-retryable transport fault.
    Fail(Error),
}

/// Executes logical API calls against a transport.
///
/// Holds no mutable state: safe to share across concurrent logical calls,
/// which each run their attempts strictly sequentially.
#[derive(Debug)]
pub struct RequestExecutor<T: Transport = HttpTransport> {
    config: ClientConfig,
    transport: T,
    signer: Option<RequestSigner>,
}

impl RequestExecutor<HttpTransport> {
    /// Creates an executor over the default pooled HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid configuration and
    /// [`Error::SigningKey`] for an unusable signing key.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, HttpTransport::new())
    }
}

impl<T: Transport> RequestExecutor<T> {
    /// Creates an executor over a caller-supplied transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid configuration and
    /// [`Error::SigningKey`] for an unusable signing key.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let signer = config.signing.as_ref().map(RequestSigner::new).transpose()?;
        Ok(Self { config, transport, signer })
    }

    /// The configuration this executor was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Executes one logical API call.
    ///
    /// `conflict_resolver` fetches the already-created resource when the
    /// service reports an idempotent-creation conflict; pass `None` to
    /// surface the conflict as [`Error::InvalidState`].
    ///
    /// # Errors
    ///
    /// Returns the classified API error, the transport error after retry
    /// exhaustion, or a construction/decoding failure. See the
    /// [`error`](crate::error) module for the taxonomy.
    #[instrument(
        skip_all,
        fields(method = descriptor.method.as_str(), path = %descriptor.path)
    )]
    pub async fn execute<'a, R>(
        &self,
        descriptor: RequestDescriptor,
        settings: RequestSettings,
        conflict_resolver: Option<ConflictResolver<'a, R>>,
    ) -> Result<ApiResponse<R>>
    where
        R: DeserializeOwned + Default,
    {
        match settings.deadline {
            Some(deadline) => {
                tokio::time::timeout(deadline, self.run(descriptor, &settings, conflict_resolver))
                    .await
                    .map_err(|_| Error::DeadlineElapsed)?
            }
            None => self.run(descriptor, &settings, conflict_resolver).await,
        }
    }

    /// The retry loop: up to `max_retries` retryable attempts, then one
    /// final attempt whose outcome is returned as-is.
    async fn run<'a, R>(
        &self,
        descriptor: RequestDescriptor,
        settings: &RequestSettings,
        conflict_resolver: Option<ConflictResolver<'a, R>>,
    ) -> Result<ApiResponse<R>>
    where
        R: DeserializeOwned + Default,
    {
        let max_retries = settings.max_retries.unwrap_or(self.config.max_retries);
        let delay = settings.retry_delay.unwrap_or(self.config.retry_delay);

        // Generated once per logical call, never per attempt: the server
        // must recognize every retry as the same logical operation.
        let idempotency_key = descriptor.idempotent.then(|| {
            settings
                .idempotency_key
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string())
        });

        // Identical across retries; only headers and the signature are
        // rebuilt per attempt.
        let url = self.build_url(&descriptor)?;
        let body = build_body(&descriptor)?;

        let mut attempt: u32 = 0;
        loop {
            let request = self.build_request(
                &descriptor,
                &url,
                body.clone(),
                settings,
                idempotency_key.as_deref(),
            )?;

            match self.send_once::<R>(request).await {
                Attempt::Success(response) => {
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "request succeeded after retry");
                    }
                    return Ok(response);
                }
                Attempt::Fail(error) => return Err(error),
                Attempt::Conflict { resource_id, error } => {
                    return match conflict_resolver {
                        Some(resolve) => {
                            debug!(resource_id, "resolving idempotent creation conflict");
                            resolve(resource_id).await
                        }
                        None => Err(error),
                    };
                }
                Attempt::Retry(error) => {
                    if attempt == max_retries {
                        return Err(error);
                    }
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries,
                        error = %error,
                        "transient transport failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Sends one attempt and classifies its outcome.
    async fn send_once<R>(&self, request: HttpRequest) -> Attempt<R>
    where
        R: DeserializeOwned + Default,
    {
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(error) if error.is_retryable() => return Attempt::Retry(error.into()),
            Err(error) => return Attempt::Fail(error.into()),
        };

        if response.is_success() {
            return match decode_success(response) {
                Ok(response) => Attempt::Success(response),
                Err(error) => Attempt::Fail(error),
            };
        }
        self.classify_failure(response)
    }

    /// Classifies an error response, surfacing resolvable conflicts.
    fn classify_failure<R>(&self, response: HttpResponse) -> Attempt<R> {
        let envelope: ApiErrorEnvelope = match serde_json::from_slice(&response.body) {
            Ok(envelope) => envelope,
            Err(_) => {
                return Attempt::Fail(Error::MalformedResponse {
                    status: response.status,
                    body: String::from_utf8_lossy(&response.body).into_owned(),
                    message: MALFORMED_RESPONSE_MESSAGE,
                });
            }
        };

        let error = classify(response.status, envelope.error);
        if !self.config.error_on_idempotency_conflict
            && let Error::InvalidState(api) = &error
            && let Some(id) = api.conflicting_resource_id()
        {
            return Attempt::Conflict { resource_id: id.to_owned(), error };
        }
        Attempt::Fail(error)
    }

    /// Resolves the descriptor's path template against the base URL and
    /// attaches the query string for bodyless methods.
    fn build_url(&self, descriptor: &RequestDescriptor) -> Result<Url> {
        let path = descriptor.resolved_path();
        let joined = format!(
            "{}/{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined)
            .map_err(|e| Error::InvalidRequest(format!("invalid request path '{path}': {e}")))?;

        if !descriptor.method.allows_body() && !descriptor.query.is_empty() {
            url.set_query(Some(&descriptor.query.encode()));
        }
        Ok(url)
    }

    /// Builds one attempt's request: default headers, idempotency key,
    /// settings overrides, mutation hook, then the signature (so it
    /// covers the final body).
    fn build_request(
        &self,
        descriptor: &RequestDescriptor,
        url: &Url,
        body: Option<Vec<u8>>,
        settings: &RequestSettings,
        idempotency_key: Option<&str>,
    ) -> Result<HttpRequest> {
        let mut request = HttpRequest::new(descriptor.method, url.clone());
        request.set_header("Accept", "application/json");
        if body.is_some() {
            request.set_header("Content-Type", "application/json");
        }
        request.set_header("Authorization", format!("Bearer {}", self.config.access_token));
        request.set_header(CLIENT_LIBRARY_HEADER, CLIENT_LIBRARY);
        request.set_header(VERSION_HEADER, self.config.api_version.clone());
        if let Some(key) = idempotency_key {
            request.set_header(IDEMPOTENCY_KEY_HEADER, key);
        }
        request.body = body;

        for (name, value) in &settings.headers {
            request.set_header(name.clone(), value.clone());
        }
        if let Some(customize) = &settings.customize {
            customize(&mut request);
        }
        if let Some(signer) = &self.signer {
            signer.sign(&mut request)?;
        }
        Ok(request)
    }
}

/// Serializes the descriptor's body, wrapped under its payload key.
fn build_body(descriptor: &RequestDescriptor) -> Result<Option<Vec<u8>>> {
    let Some(body) = &descriptor.body else {
        return Ok(None);
    };
    if !descriptor.method.allows_body() {
        return Err(Error::InvalidRequest(format!(
            "{} requests cannot carry a body",
            descriptor.method.as_str()
        )));
    }

    let payload = match descriptor.envelope {
        Some(key) => {
            let mut wrapper = serde_json::Map::new();
            wrapper.insert(key.to_owned(), body.clone());
            Value::Object(wrapper)
        }
        None => body.clone(),
    };
    let bytes = serde_json::to_vec(&payload)
        .map_err(|e| Error::InvalidRequest(format!("unserializable request body: {e}")))?;
    Ok(Some(bytes))
}

/// Decodes a 2xx response; empty or `null` bodies yield `R::default()`.
fn decode_success<R>(response: HttpResponse) -> Result<ApiResponse<R>>
where
    R: DeserializeOwned + Default,
{
    let HttpResponse { status, headers, body } = response;
    let resource = if body.is_empty() {
        R::default()
    } else {
        match serde_json::from_slice::<Option<R>>(&body) {
            Ok(Some(resource)) => resource,
            Ok(None) => R::default(),
            Err(_) => {
                return Err(Error::MalformedResponse {
                    status,
                    body: String::from_utf8_lossy(&body).into_owned(),
                    message: MALFORMED_RESPONSE_MESSAGE,
                });
            }
        }
    };
    Ok(ApiResponse { resource, status, headers, body })
}
