//! Protocol version 2 (V2) types.
//!
//! V2 servers send offers base64-encoded in the `Payment-Required` header. The signed
//! payload echoes the accepted offer and travels back in `Payment-Signature`.
//!
//! The `network` of an offer is kept as a string: it is normally a CAIP-2 id
//! (`eip155:10087`) but some servers send a known network name (`gatelayer_testnet`).
//! Use [`crate::chain::ChainId::resolve`] to interpret it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::proto::OriginalJson;

/// Version marker that serializes as the integer `2`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct X402Version2;

impl X402Version2 {
    pub const VALUE: u8 = 2;
}

impl From<X402Version2> for u8 {
    fn from(_: X402Version2) -> Self {
        X402Version2::VALUE
    }
}

impl Serialize for X402Version2 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for X402Version2 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let num = u8::deserialize(deserializer)?;
        if num == Self::VALUE {
            Ok(X402Version2)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected version {}, got {}",
                Self::VALUE,
                num
            )))
        }
    }
}

impl fmt::Display for X402Version2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::VALUE)
    }
}

/// What the buyer is paying for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
    pub url: String,
}

/// A signed V2 payment authorization.
///
/// Built once by a scheme client and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TAccepted = OriginalJson, TPayload = Box<serde_json::value::RawValue>> {
    /// The offer the buyer accepted, as the server sent it.
    pub accepted: TAccepted,
    pub payload: TPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,
    pub x402_version: X402Version2,
}

/// A single V2 offer.
///
/// # Type Parameters
///
/// - `TAmount` - amount in the asset's smallest unit (default: decimal `String`)
/// - `TAddress` - payee and asset address type (default: `String`)
/// - `TExtra` - scheme-specific extra data (default: raw JSON)
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements<
    TAmount = String,
    TAddress = String,
    TExtra = Option<serde_json::Value>,
> {
    pub scheme: String,
    /// CAIP-2 chain id or known network name.
    pub network: String,
    pub amount: TAmount,
    pub pay_to: TAddress,
    #[serde(default)]
    pub max_timeout_seconds: u64,
    /// Token contract. Absent means the network's default asset.
    pub asset: Option<TAddress>,
    #[serde(default)]
    pub extra: TExtra,
}

impl<TAmount, TAddress, TExtra> TryFrom<&OriginalJson>
    for PaymentRequirements<TAmount, TAddress, TExtra>
where
    TAmount: for<'a> Deserialize<'a>,
    TAddress: for<'a> Deserialize<'a>,
    TExtra: for<'a> Deserialize<'a> + Default,
{
    type Error = serde_json::Error;

    fn try_from(value: &OriginalJson) -> Result<Self, Self::Error> {
        serde_json::from_str(value.as_str())
    }
}

/// V2 402 response, as carried in the `Payment-Required` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired<TAccepts = PaymentRequirements> {
    pub x402_version: X402Version2,
    /// Set when a previously submitted payment was refused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,
    #[serde(default = "Vec::default")]
    pub accepts: Vec<TAccepts>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_offer_with_network_name_and_no_asset() {
        let raw = serde_json::value::to_raw_value(&json!({
            "scheme": "exact",
            "network": "gatelayer_testnet",
            "amount": "1000",
            "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C"
        }))
        .unwrap();
        let offer = PaymentRequirements::<String, String>::try_from(&OriginalJson(raw)).unwrap();
        assert_eq!(offer.network, "gatelayer_testnet");
        assert!(offer.asset.is_none());
        assert!(offer.extra.is_none());
        assert_eq!(offer.max_timeout_seconds, 0);
    }

    #[test]
    fn test_offer_with_explicit_asset() {
        let raw = serde_json::value::to_raw_value(&json!({
            "scheme": "exact",
            "network": "eip155:10087",
            "amount": "1000",
            "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
            "asset": "0x9be8Df37C788B244cFc28E46654aD5Ec28a880AF",
            "extra": {"name": "USDC", "version": "2"}
        }))
        .unwrap();
        let offer: PaymentRequirements = PaymentRequirements::try_from(&OriginalJson(raw)).unwrap();
        assert_eq!(
            offer.asset.as_deref(),
            Some("0x9be8Df37C788B244cFc28E46654aD5Ec28a880AF")
        );
        assert_eq!(offer.extra.unwrap()["version"], "2");
    }

    #[test]
    fn test_payment_required_keeps_raw_offers() {
        let header = json!({
            "x402Version": 2,
            "resource": {"url": "https://api.example.com/premium"},
            "accepts": [
                {"scheme": "exact", "network": "eip155:10087", "amount": "1000", "payTo": "0x01", "vendorField": 7}
            ]
        });
        let required: PaymentRequired<OriginalJson> = serde_json::from_value(header).unwrap();
        assert!(required.accepts[0].as_str().contains("vendorField"));
        assert_eq!(
            required.resource.unwrap().url,
            "https://api.example.com/premium"
        );
    }
}
