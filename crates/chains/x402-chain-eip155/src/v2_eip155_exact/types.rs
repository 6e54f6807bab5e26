//! Wire types for the V2 EIP-155 "exact" scheme.

use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};
use x402_types::proto::{OriginalJson, v2};

use crate::authorization::Authorization;

pub const EXACT_SCHEME: &str = "exact";

/// Scheme-specific part of the payment payload.
///
/// ```json
/// {
///   "signature": "0x2d6a7588...",
///   "authorization": { "from": "0x...", "to": "0x...", "value": "1000", ... }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactEvmPayload {
    /// 65-byte `r ‖ s ‖ v` signature.
    pub signature: Bytes,
    pub authorization: Authorization,
}

/// The offer's `extra` object, as far as this scheme reads it.
///
/// Both fields override the asset's default EIP-712 domain parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequirementsExtra {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl PaymentRequirementsExtra {
    /// Reads `name` and `version` from an offer's `extra`. Anything else is ignored.
    pub fn from_extra(extra: Option<&serde_json::Value>) -> Self {
        extra
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

/// Signed payload. The accepted offer is echoed verbatim.
pub type PaymentPayload = v2::PaymentPayload<OriginalJson, ExactEvmPayload>;
