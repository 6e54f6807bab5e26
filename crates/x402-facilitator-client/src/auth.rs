//! Request authentication for the facilitator endpoint.
//!
//! Every request is signed with the account's API secret:
//!
//! ```text
//! prehash   = timestampMillis ‖ signingPath ‖ rawBody
//! signature = base64(HMAC-SHA256(secret, prehash))
//! ```
//!
//! The body bytes must be the ones sent on the wire. Re-serializing the body for signing
//! breaks the facilitator's check even when the payload itself is valid.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use hmac::{Hmac, Mac};
use http::HeaderMap;
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Path mixed into every prehash, independent of the URL actually called.
pub const SIGNING_PATH: &str = "/api/v1/dex";

pub const ENV_API_KEY: &str = "GATE_WEB3_API_KEY";
pub const ENV_API_SECRET: &str = "GATE_WEB3_API_SECRET";
pub const ENV_PASSPHRASE: &str = "GATE_WEB3_PASSPHRASE";
pub const ENV_REAL_IP: &str = "GATE_WEB3_REAL_IP";

pub const DEFAULT_FORWARDED_FOR: &str = "127.0.0.1";

/// API key material used to sign requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
    passphrase: Option<String>,
    forwarded_for: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            passphrase: None,
            forwarded_for: DEFAULT_FORWARDED_FOR.to_string(),
        }
    }

    /// Sets `X-Passphrase`. An empty passphrase is not sent.
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        let passphrase = passphrase.into();
        self.passphrase = (!passphrase.is_empty()).then_some(passphrase);
        self
    }

    /// Sets `X-Forwarded-For`. An empty value keeps the default.
    pub fn with_forwarded_for(mut self, forwarded_for: impl Into<String>) -> Self {
        let forwarded_for = forwarded_for.into();
        if !forwarded_for.is_empty() {
            self.forwarded_for = forwarded_for;
        }
        self
    }

    /// Reads `GATE_WEB3_*` variables from the process environment.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds credentials from a variable lookup.
    ///
    /// Returns `None` unless both key and secret are non-blank.
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY)?.trim().to_string();
        let api_secret = lookup(ENV_API_SECRET)?.trim().to_string();
        if api_key.is_empty() || api_secret.is_empty() {
            return None;
        }
        let mut credentials = Self::new(api_key, api_secret);
        if let Some(passphrase) = lookup(ENV_PASSPHRASE) {
            credentials = credentials.with_passphrase(passphrase);
        }
        if let Some(real_ip) = lookup(ENV_REAL_IP) {
            credentials = credentials.with_forwarded_for(real_ip);
        }
        Some(credentials)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }

    pub fn forwarded_for(&self) -> &str {
        &self.forwarded_for
    }

    /// Signs one request body.
    pub fn sign(&self, timestamp_millis: u64, body: &[u8]) -> Result<String, hmac::digest::InvalidLength> {
        sign_prehash(self.api_secret.as_bytes(), timestamp_millis, SIGNING_PATH, body)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("forwarded_for", &self.forwarded_for)
            .finish()
    }
}

/// `base64(HMAC-SHA256(secret, timestamp ‖ path ‖ body))`.
pub fn sign_prehash(
    secret: &[u8],
    timestamp_millis: u64,
    signing_path: &str,
    body: &[u8],
) -> Result<String, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret)?;
    mac.update(timestamp_millis.to_string().as_bytes());
    mac.update(signing_path.as_bytes());
    mac.update(body);
    Ok(b64.encode(mac.finalize().into_bytes()))
}

/// Extra headers per endpoint.
#[derive(Debug, Clone, Default)]
pub struct AuthHeaders {
    pub verify: HeaderMap,
    pub settle: HeaderMap,
    pub supported: HeaderMap,
}

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Supplies additional authentication headers.
///
/// Asked once per request. Its headers are applied after the default signing headers and
/// replace any with the same name.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn auth_headers(&self) -> Result<AuthHeaders, BoxError>;
}

/// A provider that always returns the same headers.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthHeaders(pub AuthHeaders);

#[async_trait]
impl AuthProvider for StaticAuthHeaders {
    async fn auth_headers(&self) -> Result<AuthHeaders, BoxError> {
        Ok(self.0.clone())
    }
}
