//! A client for a remote facilitator behind a single action-dispatch endpoint.
//!
//! All three operations POST to the same URL. The body names the operation:
//!
//! ```json
//! { "action": "x402.verify", "params": { "x402Version": 2, "paymentPayload": {..}, "paymentRequirements": {..} } }
//! ```
//!
//! and every answer is wrapped in an envelope:
//!
//! ```json
//! { "code": 0, "msg": "", "data": { "isValid": true, "payer": "0x..." } }
//! ```
//!
//! Only HTTP 200 together with `code == 0` is a success.

use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;
use x402_types::proto::{SettleResponse, SupportedResponse, VerifyResponse, X402Version};

use crate::auth::{AuthProvider, Credentials};
use crate::error::FacilitatorClientError;

/// Gate Web3 OpenAPI testnet facilitator.
pub const DEFAULT_FACILITATOR_URL: &str = "https://openapi-test.gateweb3.cc/api/v1/x402";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

static X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
static X_TIMESTAMP: HeaderName = HeaderName::from_static("x-timestamp");
static X_SIGNATURE: HeaderName = HeaderName::from_static("x-signature");
static X_PASSPHRASE: HeaderName = HeaderName::from_static("x-passphrase");
static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
static X_TARGET_URI: HeaderName = HeaderName::from_static("x-target-uri");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Verify,
    Settle,
    Supported,
}

impl Action {
    fn name(self) -> &'static str {
        match self {
            Action::Verify => "x402.verify",
            Action::Settle => "x402.settle",
            Action::Supported => "x402.supported",
        }
    }

    fn target_uri(self) -> &'static str {
        match self {
            Action::Verify => "v1/x402/verify",
            Action::Settle => "v1/x402/settle",
            Action::Supported => "v1/x402/supported",
        }
    }
}

#[derive(Serialize)]
struct ActionRequest<P> {
    action: &'static str,
    params: P,
}

/// Payload and requirements are forwarded as raw JSON so unknown fields survive.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentParams<'a> {
    x402_version: X402Version,
    payment_payload: &'a RawValue,
    payment_requirements: &'a RawValue,
}

#[derive(Serialize)]
struct NoParams {}

#[derive(Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Failure details the facilitator may put in `data` alongside a non-zero code.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct FailureData {
    #[serde(alias = "invalid_reason")]
    invalid_reason: Option<String>,
    #[serde(alias = "error_reason")]
    error_reason: Option<String>,
    payer: Option<String>,
    network: Option<String>,
    transaction: Option<String>,
}

impl Envelope {
    fn decode(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    fn is_success(&self, status: StatusCode) -> bool {
        status == StatusCode::OK && self.code == 0
    }

    fn failure(&self) -> FailureData {
        serde_json::from_value(self.data.clone()).unwrap_or_default()
    }

    /// The error for a failure without a structured reason.
    fn into_error(self, context: &'static str, status: StatusCode) -> FacilitatorClientError {
        if status != StatusCode::OK {
            FacilitatorClientError::HttpStatus {
                context,
                status,
                code: self.code,
                msg: self.msg,
            }
        } else {
            FacilitatorClientError::Business {
                context,
                code: self.code,
                msg: self.msg,
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// TTL cache for [`SupportedResponse`].
#[derive(Clone, Debug)]
struct SupportedCacheState {
    response: SupportedResponse,
    expires_at: Instant,
}

/// Caches the `supported` answer.
///
/// Each clone has an independent cache state.
#[derive(Debug)]
pub struct SupportedCache {
    ttl: Duration,
    state: RwLock<Option<SupportedCacheState>>,
}

impl SupportedCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(None),
        }
    }

    /// Returns the cached response if still fresh.
    pub async fn get(&self) -> Option<SupportedResponse> {
        let guard = self.state.read().await;
        let cache = guard.as_ref()?;
        if Instant::now() < cache.expires_at {
            Some(cache.response.clone())
        } else {
            None
        }
    }

    pub async fn set(&self, response: SupportedResponse) {
        let mut guard = self.state.write().await;
        *guard = Some(SupportedCacheState {
            response,
            expires_at: Instant::now() + self.ttl,
        });
    }

    pub async fn clear(&self) {
        let mut guard = self.state.write().await;
        *guard = None;
    }
}

impl Clone for SupportedCache {
    fn clone(&self) -> Self {
        Self::new(self.ttl)
    }
}

/// Client for the facilitator's `verify`, `settle` and `supported` actions.
///
/// Payloads and requirements are taken as serialized JSON and forwarded untouched.
#[derive(Clone)]
pub struct FacilitatorClient {
    url: Url,
    client: Client,
    credentials: Option<Credentials>,
    auth_provider: Option<Arc<dyn AuthProvider>>,
    timeout: Duration,
    supported_cache: SupportedCache,
}

impl fmt::Debug for FacilitatorClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacilitatorClient")
            .field("url", &self.url.as_str())
            .field("credentials", &self.credentials)
            .field("auth_provider", &self.auth_provider.is_some())
            .field("timeout", &self.timeout)
            .field("supported_cache", &self.supported_cache)
            .finish()
    }
}

impl FacilitatorClient {
    /// Default TTL for the `supported` cache (10 minutes).
    pub const DEFAULT_SUPPORTED_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

    /// A client for `url`, signing with credentials from `GATE_WEB3_*` when present.
    pub fn try_new(url: Url) -> Result<Self, FacilitatorClientError> {
        Ok(Self {
            url,
            client: Client::new(),
            credentials: Credentials::from_env(),
            auth_provider: None,
            timeout: DEFAULT_TIMEOUT,
            supported_cache: SupportedCache::new(Self::DEFAULT_SUPPORTED_CACHE_TTL),
        })
    }

    /// A client for [`DEFAULT_FACILITATOR_URL`].
    pub fn try_default() -> Result<Self, FacilitatorClientError> {
        Self::try_from(DEFAULT_FACILITATOR_URL)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn supported_cache(&self) -> &SupportedCache {
        &self.supported_cache
    }

    pub fn with_credentials(&self, credentials: Credentials) -> Self {
        let mut this = self.clone();
        this.credentials = Some(credentials);
        this
    }

    /// Sends requests unsigned, leaving authentication to an [`AuthProvider`] if any.
    pub fn without_credentials(&self) -> Self {
        let mut this = self.clone();
        this.credentials = None;
        this
    }

    pub fn with_auth_provider<A>(&self, provider: A) -> Self
    where
        A: AuthProvider + 'static,
    {
        let mut this = self.clone();
        this.auth_provider = Some(Arc::new(provider));
        this
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut this = self.clone();
        this.timeout = timeout;
        this
    }

    /// Sets the TTL for caching the `supported` response.
    ///
    /// Use [`Self::without_supported_cache()`] to disable caching.
    pub fn with_supported_cache_ttl(&self, ttl: Duration) -> Self {
        let mut this = self.clone();
        this.supported_cache = SupportedCache::new(ttl);
        this
    }

    pub fn without_supported_cache(&self) -> Self {
        self.with_supported_cache_ttl(Duration::ZERO)
    }

    /// Asks the facilitator whether `payload` satisfies `requirements`.
    ///
    /// Only a valid payload yields `Ok`. An answer with `isValid: false`, or a non-zero
    /// business code carrying an `invalidReason`, becomes
    /// [`FacilitatorClientError::VerifyRejected`]. The reason is empty when the facilitator
    /// gave none.
    #[instrument(name = "x402.facilitator_client.verify", skip_all, err, fields(timeout = ?self.timeout))]
    pub async fn verify(
        &self,
        payload: &[u8],
        requirements: &[u8],
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        const CONTEXT: &str = "x402.verify";
        let body = payment_body(Action::Verify, payload, requirements)?;
        let headers = self.request_headers(Action::Verify, &body).await?;
        let (status, response) = self
            .send(headers, body)
            .await
            .map_err(|source| FacilitatorClientError::Http {
                context: CONTEXT,
                source,
            })?;

        let envelope =
            Envelope::decode(&response).ok_or_else(|| decode_error(CONTEXT, status, &response))?;
        debug!(http = %status, code = envelope.code, msg = %envelope.msg, "Facilitator answered verify");
        let network = non_empty(envelope.failure().network).or_else(|| offer_network(requirements));
        if envelope.is_success(status) {
            let verified: VerifyResponse = serde_json::from_value(envelope.data.clone())
                .map_err(|_| decode_error(CONTEXT, status, &response))?;
            return match verified {
                VerifyResponse::Valid { .. } => Ok(verified),
                VerifyResponse::Invalid { reason, payer } => {
                    Err(FacilitatorClientError::VerifyRejected {
                        reason,
                        payer: non_empty(payer),
                        network,
                        code: envelope.code,
                        msg: envelope.msg,
                    })
                }
            };
        }
        let failure = envelope.failure();
        if let Some(reason) = non_empty(failure.invalid_reason) {
            return Err(FacilitatorClientError::VerifyRejected {
                reason,
                payer: non_empty(failure.payer),
                network,
                code: envelope.code,
                msg: envelope.msg,
            });
        }
        Err(envelope.into_error(CONTEXT, status))
    }

    /// Asks the facilitator to execute the payment on-chain.
    ///
    /// Never retried here. If the request may have been received but no decodable answer
    /// came back, the result is [`FacilitatorClientError::SettlementOutcomeUnknown`]. An
    /// explicit `success: false` is a definite failure and becomes
    /// [`FacilitatorClientError::SettleRejected`].
    #[instrument(name = "x402.facilitator_client.settle", skip_all, err, fields(timeout = ?self.timeout))]
    pub async fn settle(
        &self,
        payload: &[u8],
        requirements: &[u8],
    ) -> Result<SettleResponse, FacilitatorClientError> {
        const CONTEXT: &str = "x402.settle";
        let body = payment_body(Action::Settle, payload, requirements)?;
        let headers = self.request_headers(Action::Settle, &body).await?;
        let (status, response) = self.send(headers, body).await.map_err(|source| {
            if source.is_connect() || source.is_builder() {
                FacilitatorClientError::Http {
                    context: CONTEXT,
                    source,
                }
            } else {
                warn!(error = %source, "Settle request failed after sending");
                FacilitatorClientError::SettlementOutcomeUnknown {
                    reason: source.to_string(),
                }
            }
        })?;

        let Some(envelope) = Envelope::decode(&response) else {
            return Err(outcome_unknown(status, &response));
        };
        debug!(http = %status, code = envelope.code, msg = %envelope.msg, "Facilitator answered settle");
        if envelope.is_success(status) {
            let settled: SettleResponse = serde_json::from_value(envelope.data.clone())
                .map_err(|_| outcome_unknown(status, &response))?;
            return match settled {
                SettleResponse::Success { .. } => Ok(settled),
                SettleResponse::Error {
                    reason,
                    payer,
                    transaction,
                    network,
                } => Err(FacilitatorClientError::SettleRejected {
                    reason,
                    payer: non_empty(payer),
                    network: non_empty(Some(network)).or_else(|| offer_network(requirements)),
                    transaction: non_empty(transaction),
                    code: envelope.code,
                    msg: envelope.msg,
                }),
            };
        }
        let failure = envelope.failure();
        if let Some(reason) = non_empty(failure.error_reason) {
            return Err(FacilitatorClientError::SettleRejected {
                reason,
                payer: non_empty(failure.payer),
                network: non_empty(failure.network).or_else(|| offer_network(requirements)),
                transaction: non_empty(failure.transaction),
                code: envelope.code,
                msg: envelope.msg,
            });
        }
        if status.is_server_error() {
            return Err(FacilitatorClientError::SettlementOutcomeUnknown {
                reason: format!(
                    "http={status} code={} msg={}",
                    envelope.code, envelope.msg
                ),
            });
        }
        Err(envelope.into_error(CONTEXT, status))
    }

    /// Payment kinds the facilitator handles.
    ///
    /// Cached with a configurable TTL (default: 10 minutes). Use
    /// [`Self::supported_uncached()`] to bypass the cache.
    #[instrument(name = "x402.facilitator_client.supported", skip_all, err)]
    pub async fn supported(&self) -> Result<SupportedResponse, FacilitatorClientError> {
        if let Some(response) = self.supported_cache.get().await {
            return Ok(response);
        }
        debug!("x402.facilitator_client.supported_cache_miss");
        let response = self.supported_uncached().await?;
        self.supported_cache.set(response.clone()).await;
        Ok(response)
    }

    /// Always queries the facilitator.
    #[instrument(name = "x402.facilitator_client.supported_uncached", skip_all, err)]
    pub async fn supported_uncached(&self) -> Result<SupportedResponse, FacilitatorClientError> {
        const CONTEXT: &str = "x402.supported";
        let request = ActionRequest {
            action: Action::Supported.name(),
            params: NoParams {},
        };
        let body = serde_json::to_vec(&request).map_err(|source| {
            FacilitatorClientError::InvalidJson {
                context: "Failed to encode supported request",
                source,
            }
        })?;
        let headers = self.request_headers(Action::Supported, &body).await?;
        let (status, response) = self
            .send(headers, body)
            .await
            .map_err(|source| FacilitatorClientError::Http {
                context: CONTEXT,
                source,
            })?;

        let envelope =
            Envelope::decode(&response).ok_or_else(|| decode_error(CONTEXT, status, &response))?;
        if envelope.is_success(status) {
            return serde_json::from_value(envelope.data)
                .map_err(|_| decode_error(CONTEXT, status, &response));
        }
        Err(envelope.into_error(CONTEXT, status))
    }

    /// Default signing headers, then the auth provider's headers on top.
    async fn request_headers(
        &self,
        action: Action,
        body: &[u8],
    ) -> Result<HeaderMap, FacilitatorClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(credentials) = &self.credentials {
            let timestamp = now_millis();
            let signature = credentials.sign(timestamp, body)?;
            let request_id = Uuid::new_v4().to_string();
            debug!(action = action.name(), %request_id, "Signing facilitator request");

            headers.insert(X_API_KEY.clone(), header_value("X-Api-Key", credentials.api_key())?);
            headers.insert(X_TIMESTAMP.clone(), HeaderValue::from(timestamp));
            headers.insert(X_SIGNATURE.clone(), header_value("X-Signature", &signature)?);
            if let Some(passphrase) = credentials.passphrase() {
                headers.insert(X_PASSPHRASE.clone(), header_value("X-Passphrase", passphrase)?);
            }
            headers.insert(
                X_FORWARDED_FOR.clone(),
                header_value("X-Forwarded-For", credentials.forwarded_for())?,
            );
            headers.insert(X_REQUEST_ID.clone(), header_value("X-Request-Id", &request_id)?);
            headers.insert(X_TARGET_URI.clone(), HeaderValue::from_static(action.target_uri()));
        }

        if let Some(provider) = &self.auth_provider {
            let auth = provider
                .auth_headers()
                .await
                .map_err(FacilitatorClientError::AuthProvider)?;
            let overrides = match action {
                Action::Verify => &auth.verify,
                Action::Settle => &auth.settle,
                Action::Supported => &auth.supported,
            };
            for (name, value) in overrides {
                headers.insert(name.clone(), value.clone());
            }
        }
        Ok(headers)
    }

    async fn send(
        &self,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<(StatusCode, Vec<u8>), reqwest::Error> {
        let response = self
            .client
            .post(self.url.clone())
            .headers(headers)
            .timeout(self.timeout)
            .body(body)
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        Ok((status, bytes.to_vec()))
    }
}

/// Serializes the body once. These exact bytes are signed and sent.
fn payment_body(
    action: Action,
    payload: &[u8],
    requirements: &[u8],
) -> Result<Vec<u8>, FacilitatorClientError> {
    let x402_version = X402Version::detect(payload)?;
    let payment_payload: &RawValue =
        serde_json::from_slice(payload).map_err(|source| FacilitatorClientError::InvalidJson {
            context: "Payment payload",
            source,
        })?;
    let payment_requirements: &RawValue =
        serde_json::from_slice(requirements).map_err(|source| {
            FacilitatorClientError::InvalidJson {
                context: "Payment requirements",
                source,
            }
        })?;
    let request = ActionRequest {
        action: action.name(),
        params: PaymentParams {
            x402_version,
            payment_payload,
            payment_requirements,
        },
    };
    serde_json::to_vec(&request).map_err(|source| FacilitatorClientError::InvalidJson {
        context: "Failed to encode facilitator request",
        source,
    })
}

/// `network` of the offer being paid, for error reports.
fn offer_network(requirements: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct Offer {
        network: Option<String>,
    }
    serde_json::from_slice::<Offer>(requirements)
        .ok()
        .and_then(|offer| non_empty(offer.network))
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, FacilitatorClientError> {
    HeaderValue::from_str(value).map_err(|_| FacilitatorClientError::InvalidHeader(name))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn decode_error(context: &'static str, status: StatusCode, body: &[u8]) -> FacilitatorClientError {
    FacilitatorClientError::Decode {
        context,
        status,
        body: String::from_utf8_lossy(body).into_owned(),
    }
}

fn outcome_unknown(status: StatusCode, body: &[u8]) -> FacilitatorClientError {
    FacilitatorClientError::SettlementOutcomeUnknown {
        reason: format!(
            "undecodable response (http={status}): {}",
            String::from_utf8_lossy(body)
        ),
    }
}

impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(value).map_err(|e| FacilitatorClientError::UrlParse {
            context: "Failed to parse facilitator url",
            source: e,
        })?;
        FacilitatorClient::try_new(url)
    }
}

impl TryFrom<String> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FacilitatorClient::try_from(value.as_str())
    }
}
