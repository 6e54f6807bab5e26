//! Protocol types for x402 payment messages.
//!
//! Two protocol versions are in circulation:
//!
//! - **V1** ([`v1`]): offers in the 402 JSON body, network names, `X-Payment` header
//! - **V2** ([`v2`]): offers in the base64 `Payment-Required` header, CAIP-2 chain ids,
//!   the accepted offer echoed back inside the payload
//!
//! Facilitator results ([`VerifyResponse`], [`SettleResponse`]) have the same shape in both
//! versions and live here.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{VecSkipError, serde_as};
use std::collections::HashMap;
use std::fmt;

pub mod v1;
pub mod v2;

/// Protocol version of a payment payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum X402Version {
    V1,
    V2,
}

/// The payload carries neither a usable version tag nor a recognizable shape.
#[derive(Debug, thiserror::Error)]
pub enum VersionDetectionError {
    #[error("Payload is not a JSON object: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("Unsupported x402Version {0}")]
    UnsupportedVersion(u64),
    #[error("Cannot infer protocol version from payload shape")]
    UnknownShape,
}

impl X402Version {
    pub fn as_u8(&self) -> u8 {
        match self {
            X402Version::V1 => 1,
            X402Version::V2 => 2,
        }
    }

    /// Detects the protocol version of a serialized payment payload.
    ///
    /// An explicit numeric `x402Version` wins. Without one, a payload carrying `accepted`
    /// is V2 and one carrying both `scheme` and `network` at the top level is V1.
    pub fn detect(payload: &[u8]) -> Result<Self, VersionDetectionError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct VersionHint {
            #[serde(default)]
            x402_version: Option<serde_json::Value>,
            #[serde(default)]
            accepted: Option<IgnoredAny>,
            #[serde(default)]
            scheme: Option<IgnoredAny>,
            #[serde(default)]
            network: Option<IgnoredAny>,
        }

        let hint: VersionHint = serde_json::from_slice(payload)?;
        if let Some(version) = hint.x402_version.as_ref().and_then(|v| v.as_u64()) {
            return match version {
                1 => Ok(X402Version::V1),
                2 => Ok(X402Version::V2),
                other => Err(VersionDetectionError::UnsupportedVersion(other)),
            };
        }
        if hint.accepted.is_some() {
            Ok(X402Version::V2)
        } else if hint.scheme.is_some() && hint.network.is_some() {
            Ok(X402Version::V1)
        } else {
            Err(VersionDetectionError::UnknownShape)
        }
    }
}

impl From<X402Version> for u8 {
    fn from(value: X402Version) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for X402Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

impl Serialize for X402Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for X402Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match u8::deserialize(deserializer)? {
            1 => Ok(X402Version::V1),
            2 => Ok(X402Version::V2),
            other => Err(serde::de::Error::custom(format!(
                "unsupported x402Version {other}"
            ))),
        }
    }
}

/// A payment method a facilitator can handle.
///
/// ```json
/// { "x402Version": 2, "scheme": "exact", "network": "eip155:10087" }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SupportedPaymentKind {
    pub x402_version: u8,
    pub scheme: String,
    /// CAIP-2 chain id for V2, network name for V1.
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Result of the facilitator's `supported` action.
///
/// Kinds that fail to parse are skipped rather than failing the whole response.
#[serde_as]
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    #[serde_as(as = "VecSkipError<_>")]
    #[serde(default)]
    pub kinds: Vec<SupportedPaymentKind>,
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Signer addresses per network.
    #[serde(default)]
    pub signers: HashMap<String, Vec<String>>,
}

/// Result of verifying a payment payload against its requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResponse {
    /// The payload matches the requirements and passes all checks.
    Valid { payer: String },
    /// The payload was well-formed but rejected.
    Invalid {
        reason: String,
        payer: Option<String>,
    },
}

impl VerifyResponse {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResponse::Valid { .. })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponseWire {
    #[serde(alias = "is_valid")]
    is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default, alias = "invalid_reason", skip_serializing_if = "Option::is_none")]
    invalid_reason: Option<String>,
}

impl Serialize for VerifyResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            VerifyResponse::Valid { payer } => VerifyResponseWire {
                is_valid: true,
                payer: Some(payer.clone()),
                invalid_reason: None,
            },
            VerifyResponse::Invalid { reason, payer } => VerifyResponseWire {
                is_valid: false,
                payer: payer.clone(),
                invalid_reason: Some(reason.clone()),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifyResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = VerifyResponseWire::deserialize(deserializer)?;
        if wire.is_valid {
            let payer = wire
                .payer
                .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
            Ok(VerifyResponse::Valid { payer })
        } else {
            // facilitators may refuse without saying why
            Ok(VerifyResponse::Invalid {
                reason: wire.invalid_reason.unwrap_or_default(),
                payer: wire.payer,
            })
        }
    }
}

/// Result of settling a payment on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleResponse {
    Success {
        payer: Option<String>,
        /// Settlement transaction hash.
        transaction: String,
        network: String,
    },
    Error {
        reason: String,
        payer: Option<String>,
        /// Present when a transaction was submitted but failed.
        transaction: Option<String>,
        network: String,
    },
}

impl SettleResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, SettleResponse::Success { .. })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleResponseWire {
    success: bool,
    #[serde(default, alias = "error_reason", skip_serializing_if = "Option::is_none")]
    error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction: Option<String>,
    #[serde(default)]
    network: String,
}

impl Serialize for SettleResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            SettleResponse::Success {
                payer,
                transaction,
                network,
            } => SettleResponseWire {
                success: true,
                error_reason: None,
                payer: payer.clone(),
                transaction: Some(transaction.clone()),
                network: network.clone(),
            },
            SettleResponse::Error {
                reason,
                payer,
                transaction,
                network,
            } => SettleResponseWire {
                success: false,
                error_reason: Some(reason.clone()),
                payer: payer.clone(),
                transaction: transaction.clone(),
                network: network.clone(),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SettleResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = SettleResponseWire::deserialize(deserializer)?;
        if wire.success {
            let transaction = wire
                .transaction
                .ok_or_else(|| serde::de::Error::missing_field("transaction"))?;
            Ok(SettleResponse::Success {
                payer: wire.payer,
                transaction,
                network: wire.network,
            })
        } else {
            Ok(SettleResponse::Error {
                reason: wire.error_reason.unwrap_or_default(),
                payer: wire.payer,
                transaction: wire.transaction,
                network: wire.network,
            })
        }
    }
}

/// A 402 response body or header in either protocol version.
///
/// Offers are kept as [`OriginalJson`] so one malformed offer does not hide the others, and
/// so the accepted offer can be echoed back byte-for-byte.
#[derive(Debug, Clone)]
pub enum PaymentRequired {
    V1(v1::PaymentRequired<OriginalJson>),
    V2(v2::PaymentRequired<OriginalJson>),
}

impl PaymentRequired {
    pub fn x402_version(&self) -> X402Version {
        match self {
            PaymentRequired::V1(_) => X402Version::V1,
            PaymentRequired::V2(_) => X402Version::V2,
        }
    }

    /// Server-provided explanation, set when a submitted payment was refused.
    pub fn error(&self) -> Option<&str> {
        match self {
            PaymentRequired::V1(required) => required.error.as_deref(),
            PaymentRequired::V2(required) => required.error.as_deref(),
        }
    }

    pub fn accepts(&self) -> &[OriginalJson] {
        match self {
            PaymentRequired::V1(required) => &required.accepts,
            PaymentRequired::V2(required) => &required.accepts,
        }
    }
}

/// Verbatim JSON, preserved so unknown fields round-trip untouched.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OriginalJson(pub Box<serde_json::value::RawValue>);

impl OriginalJson {
    pub fn as_str(&self) -> &str {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detect(value: serde_json::Value) -> Result<X402Version, VersionDetectionError> {
        X402Version::detect(&serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn test_detect_explicit_version_wins() {
        // shape says V2, tag says V1
        let payload = json!({"x402Version": 1, "accepted": {}, "payload": {}});
        assert_eq!(detect(payload).unwrap(), X402Version::V1);
        assert!(matches!(
            detect(json!({"x402Version": 3})),
            Err(VersionDetectionError::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn test_detect_from_shape() {
        assert_eq!(
            detect(json!({"accepted": {"scheme": "exact"}, "payload": {}})).unwrap(),
            X402Version::V2
        );
        assert_eq!(
            detect(json!({"scheme": "exact", "network": "base", "payload": {}})).unwrap(),
            X402Version::V1
        );
        assert!(matches!(
            detect(json!({"scheme": "exact"})),
            Err(VersionDetectionError::UnknownShape)
        ));
        assert!(matches!(
            X402Version::detect(b"not json"),
            Err(VersionDetectionError::NotJson(_))
        ));
    }

    #[test]
    fn test_verify_response_wire() {
        let valid: VerifyResponse =
            serde_json::from_value(json!({"isValid": true, "payer": "0xabc"})).unwrap();
        assert_eq!(
            valid,
            VerifyResponse::Valid {
                payer: "0xabc".into()
            }
        );

        let invalid: VerifyResponse = serde_json::from_value(
            json!({"is_valid": false, "invalid_reason": "insufficient_funds"}),
        )
        .unwrap();
        assert_eq!(
            invalid,
            VerifyResponse::Invalid {
                reason: "insufficient_funds".into(),
                payer: None
            }
        );
        let unexplained: VerifyResponse =
            serde_json::from_value(json!({"isValid": false, "payer": "0xabc"})).unwrap();
        assert_eq!(
            unexplained,
            VerifyResponse::Invalid {
                reason: String::new(),
                payer: Some("0xabc".into())
            }
        );
        assert!(serde_json::from_value::<VerifyResponse>(json!({"isValid": true})).is_err());
    }

    #[test]
    fn test_settle_response_wire() {
        let ok: SettleResponse = serde_json::from_value(json!({
            "success": true,
            "transaction": "0xdead",
            "network": "eip155:10087",
            "payer": "0xabc"
        }))
        .unwrap();
        assert!(ok.is_success());

        let failed: SettleResponse = serde_json::from_value(json!({
            "success": false,
            "errorReason": "nonce_used",
            "network": "eip155:10087"
        }))
        .unwrap();
        let SettleResponse::Error {
            reason,
            transaction,
            ..
        } = failed
        else {
            panic!("expected settle error");
        };
        assert_eq!(reason, "nonce_used");
        assert!(transaction.is_none());

        let unexplained: SettleResponse =
            serde_json::from_value(json!({"success": false, "network": "eip155:10087"})).unwrap();
        assert!(matches!(unexplained, SettleResponse::Error { ref reason, .. } if reason.is_empty()));
    }

    #[test]
    fn test_supported_response_skips_bad_kinds() {
        let supported: SupportedResponse = serde_json::from_value(json!({
            "kinds": [
                {"x402Version": 2, "scheme": "exact", "network": "eip155:10087"},
                {"scheme": "exact"}
            ],
            "signers": {"eip155:*": ["0x1111111111111111111111111111111111111111"]}
        }))
        .unwrap();
        assert_eq!(supported.kinds.len(), 1);
        assert_eq!(supported.signers["eip155:*"].len(), 1);
    }
}
