use http::StatusCode;
use x402_types::proto::VersionDetectionError;

use crate::auth::BoxError;

/// Errors that can occur while talking to the facilitator.
///
/// Transport failures ([`Self::Http`]) are distinct from the facilitator refusing a payment
/// ([`Self::VerifyRejected`], [`Self::SettleRejected`], [`Self::Business`]). A settle call
/// that may or may not have reached the chain is [`Self::SettlementOutcomeUnknown`] and must
/// not be retried blindly.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("Invalid JSON: {context}: {source}")]
    InvalidJson {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to detect payload version: {0}")]
    VersionDetection(#[from] VersionDetectionError),
    #[error("Invalid value for header {0}")]
    InvalidHeader(&'static str),
    #[error("Failed to sign request: {0}")]
    Signing(#[from] hmac::digest::InvalidLength),
    #[error("Auth provider failed: {0}")]
    AuthProvider(#[source] BoxError),
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Undecodable facilitator response ({status}): {context}: {body}")]
    Decode {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Unexpected HTTP status {status}: {context}: code={code} msg={msg}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        code: i64,
        msg: String,
    },
    #[error("Facilitator refused the request: {context}: code={code} msg={msg}")]
    Business {
        context: &'static str,
        code: i64,
        msg: String,
    },
    #[error("Payment verification rejected: {reason}")]
    VerifyRejected {
        reason: String,
        payer: Option<String>,
        network: Option<String>,
        code: i64,
        msg: String,
    },
    #[error("Payment settlement rejected: {reason}")]
    SettleRejected {
        reason: String,
        payer: Option<String>,
        network: Option<String>,
        transaction: Option<String>,
        code: i64,
        msg: String,
    },
    #[error("Settlement outcome unknown: {reason}")]
    SettlementOutcomeUnknown { reason: String },
}

impl FacilitatorClientError {
    /// The request failed in transit.
    ///
    /// Safe to retry with backoff. For settle this is only reported when the request was
    /// never sent.
    pub fn is_transport(&self) -> bool {
        matches!(self, FacilitatorClientError::Http { .. })
    }

    pub fn is_outcome_unknown(&self) -> bool {
        matches!(
            self,
            FacilitatorClientError::SettlementOutcomeUnknown { .. }
        )
    }

    /// Payer reported by the facilitator, when it rejected a payment.
    pub fn payer(&self) -> Option<&str> {
        match self {
            FacilitatorClientError::VerifyRejected { payer, .. }
            | FacilitatorClientError::SettleRejected { payer, .. } => payer.as_deref(),
            _ => None,
        }
    }

    /// Network of the rejected payment, when known.
    pub fn network(&self) -> Option<&str> {
        match self {
            FacilitatorClientError::VerifyRejected { network, .. }
            | FacilitatorClientError::SettleRejected { network, .. } => network.as_deref(),
            _ => None,
        }
    }
}
