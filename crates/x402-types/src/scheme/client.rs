//! Client side of a payment scheme.
//!
//! A [`X402SchemeClient`] looks at a 402 response and returns the offers it can pay as
//! [`PaymentCandidate`]s. A [`PaymentSelector`] picks one, and the candidate's signer turns
//! it into the header value sent with the retried request.

use async_trait::async_trait;
use std::fmt;

use crate::chain::ChainId;
use crate::proto::PaymentRequired;
use crate::scheme::X402SchemeId;

/// Client-side failures of the pay-and-retry flow.
///
/// Input errors (`UnsupportedNetwork`, `InvalidAmount`, `AssetMetadataMissing`) fail fast.
/// Signing errors are surfaced verbatim and never replaced by a placeholder signature.
#[derive(Debug, thiserror::Error)]
pub enum X402Error {
    #[error("Failed to parse 402 response: {0}")]
    ParseError(String),
    #[error("No registered scheme matches the offered payment requirements")]
    NoSchemeRegistered,
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid authorization: {0}")]
    InvalidAuthorization(String),
    #[error("Missing EIP-712 name/version for asset {asset} on {network}")]
    AssetMetadataMissing { network: String, asset: String },
    #[error("Failed to sign authorization: {0}")]
    FailedToSignAuthorization(String),
    #[error("Payment header is not a valid HTTP header value: {0}")]
    InvalidPaymentHeader(String),
    #[error("Request is not cloneable; streaming bodies cannot be retried with payment")]
    RequestNotCloneable,
    #[error("Payment was not accepted by the server{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    PaymentVerificationFailed { reason: Option<String> },
    #[error("Payment construction timed out")]
    Timeout,
    #[error("Failed to encode payment payload: {0}")]
    JsonEncodeError(#[from] serde_json::Error),
}

/// Produces the header value for one candidate.
#[async_trait]
pub trait PaymentCandidateSigner {
    async fn sign_payment(&self) -> Result<String, X402Error>;
}

/// An offer a registered scheme client is able to pay.
pub struct PaymentCandidate {
    /// Position of the offer in the server's `accepts` list.
    pub offer_index: usize,
    pub chain_id: ChainId,
    pub asset: String,
    /// Amount as offered; validated when signing.
    pub amount: String,
    pub scheme: String,
    pub x402_version: u8,
    pub pay_to: String,
    pub signer: Box<dyn PaymentCandidateSigner + Send + Sync>,
}

impl PaymentCandidate {
    /// Builds and signs the payment payload, returning the encoded header value.
    pub async fn sign(&self) -> Result<String, X402Error> {
        self.signer.sign_payment().await
    }
}

impl fmt::Debug for PaymentCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentCandidate")
            .field("offer_index", &self.offer_index)
            .field("chain_id", &self.chain_id)
            .field("asset", &self.asset)
            .field("amount", &self.amount)
            .field("scheme", &self.scheme)
            .field("x402_version", &self.x402_version)
            .field("pay_to", &self.pay_to)
            .finish_non_exhaustive()
    }
}

/// A scheme implementation usable by the payment middleware.
pub trait X402SchemeClient: X402SchemeId + Send + Sync {
    /// Returns one candidate per offer this client can pay. Must not perform IO.
    fn accept(&self, payment_required: &PaymentRequired) -> Vec<PaymentCandidate>;
}

/// Picks the candidate to pay from those offered.
pub trait PaymentSelector: Send + Sync {
    fn select<'a>(&self, candidates: &'a [PaymentCandidate]) -> Option<&'a PaymentCandidate>;
}

/// Picks the first candidate. Candidates are ordered by the server's offer order.
pub struct FirstMatch;

impl PaymentSelector for FirstMatch {
    fn select<'a>(&self, candidates: &'a [PaymentCandidate]) -> Option<&'a PaymentCandidate> {
        candidates.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl PaymentCandidateSigner for Fixed {
        async fn sign_payment(&self) -> Result<String, X402Error> {
            Ok(self.0.to_string())
        }
    }

    fn candidate(offer_index: usize, header: &'static str) -> PaymentCandidate {
        PaymentCandidate {
            offer_index,
            chain_id: ChainId::new("eip155", "10087"),
            asset: "0x9be8Df37C788B244cFc28E46654aD5Ec28a880AF".into(),
            amount: "1000".into(),
            scheme: "exact".into(),
            x402_version: 2,
            pay_to: "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".into(),
            signer: Box::new(Fixed(header)),
        }
    }

    #[tokio::test]
    async fn test_first_match_signs_first_candidate() {
        let candidates = vec![candidate(0, "first"), candidate(1, "second")];
        let selected = FirstMatch.select(&candidates).unwrap();
        assert_eq!(selected.offer_index, 0);
        assert_eq!(selected.sign().await.unwrap(), "first");
        assert!(FirstMatch.select(&[]).is_none());
    }

    #[test]
    fn test_verification_failed_message() {
        let with_reason = X402Error::PaymentVerificationFailed {
            reason: Some("insufficient_funds".into()),
        };
        assert_eq!(
            with_reason.to_string(),
            "Payment was not accepted by the server: insufficient_funds"
        );
        let without = X402Error::PaymentVerificationFailed { reason: None };
        assert_eq!(without.to_string(), "Payment was not accepted by the server");
    }
}
