//! ERC-3009 `transferWithAuthorization` authorizations.
//!
//! An [`Authorization`] is one payment intent: who pays whom, how much, during which window,
//! under which single-use nonce. On the wire the amount and window bounds are decimal
//! strings. They are parsed losslessly into [`TransferWithAuthorization`] before hashing,
//! and a malformed value is an error, never a zero.
//!
//! The signing digest follows EIP-712:
//!
//! ```text
//! structHash = keccak256(typeHash ‖ from ‖ to ‖ value ‖ validAfter ‖ validBefore ‖ nonce)
//! digest     = keccak256(0x19 ‖ 0x01 ‖ domainSeparator ‖ structHash)
//! ```

use alloy_primitives::{Address, B256, U256, keccak256};
use alloy_sol_types::{SolStruct, sol};
use rand::{Rng, rng};
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;
use x402_types::scheme::client::X402Error;
use x402_types::timestamp::UnixTimestamp;

use crate::domain_separator::DomainSeparator;

sol!(
    /// EIP-712 struct signed for an ERC-3009 transfer.
    ///
    /// Field order and types must match the token contract's type string exactly.
    #[derive(Debug, PartialEq, Eq)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

/// Wire form of an ERC-3009 authorization.
///
/// ```json
/// {
///   "from": "0x857b06519E91e3A54538791bDbb0E22373e36b66",
///   "to": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
///   "value": "1000",
///   "validAfter": "1740672089",
///   "validBefore": "1740675689",
///   "nonce": "0xf3746613c2d920b5fdabc0856f2aeb2d4f88ee6037b8cc5d04a71a4462f13480"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    #[serde(serialize_with = "serialize_checksummed")]
    pub from: Address,
    #[serde(serialize_with = "serialize_checksummed")]
    pub to: Address,
    /// Amount in the asset's smallest unit, decimal.
    pub value: String,
    /// Unix seconds, decimal.
    pub valid_after: String,
    /// Unix seconds, decimal.
    pub valid_before: String,
    pub nonce: B256,
}

/// EIP-55 form, as wallets and the facilitator print addresses.
fn serialize_checksummed<S: Serializer>(
    address: &Address,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&address.to_checksum(None))
}

impl Authorization {
    /// A fresh authorization usable from `now` until `now + window`, with a random nonce.
    pub fn fresh(from: Address, to: Address, value: U256, window: Duration) -> Self {
        let now = UnixTimestamp::now();
        let nonce: [u8; 32] = rng().random();
        Self {
            from,
            to,
            value: value.to_string(),
            valid_after: now.to_string(),
            valid_before: (now + window).to_string(),
            nonce: B256::from(nonce),
        }
    }

    /// Parses the decimal fields into the typed EIP-712 struct.
    ///
    /// A malformed `value` is [`X402Error::InvalidAmount`]. Malformed or inverted window
    /// bounds are [`X402Error::InvalidAuthorization`].
    pub fn to_typed(&self) -> Result<TransferWithAuthorization, X402Error> {
        let value = parse_decimal_u256(&self.value)
            .ok_or_else(|| X402Error::InvalidAmount(self.value.clone()))?;
        let valid_after = parse_decimal_u256(&self.valid_after).ok_or_else(|| {
            X402Error::InvalidAuthorization(format!("validAfter {:?}", self.valid_after))
        })?;
        let valid_before = parse_decimal_u256(&self.valid_before).ok_or_else(|| {
            X402Error::InvalidAuthorization(format!("validBefore {:?}", self.valid_before))
        })?;
        if valid_before <= valid_after {
            return Err(X402Error::InvalidAuthorization(
                "validBefore must be later than validAfter".into(),
            ));
        }
        Ok(TransferWithAuthorization {
            from: self.from,
            to: self.to,
            value,
            validAfter: valid_after,
            validBefore: valid_before,
            nonce: self.nonce,
        })
    }

    /// The EIP-712 digest to sign under `separator`.
    pub fn digest(&self, separator: &DomainSeparator) -> Result<B256, X402Error> {
        let typed = self.to_typed()?;
        Ok(eip712_digest(separator, typed.eip712_hash_struct()))
    }
}

/// `keccak256(0x19 ‖ 0x01 ‖ domainSeparator ‖ structHash)`.
pub fn eip712_digest(separator: &DomainSeparator, struct_hash: B256) -> B256 {
    let mut buf = [0u8; 66];
    buf[0] = 0x19;
    buf[1] = 0x01;
    buf[2..34].copy_from_slice(separator.as_b256().as_slice());
    buf[34..66].copy_from_slice(struct_hash.as_slice());
    keccak256(buf)
}

/// Parses a non-negative base-10 integer without loss.
///
/// Only ASCII digits are accepted: no sign, no decimal point, no whitespace, no
/// exponent. Values above `2^256 - 1` are rejected.
pub fn parse_decimal_u256(s: &str) -> Option<U256> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(s, 10).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use alloy_sol_types::eip712_domain;

    fn sample() -> Authorization {
        Authorization {
            from: address!("0x857b06519E91e3A54538791bDbb0E22373e36b66"),
            to: address!("0x209693Bc6afc0C5328bA36FaF03C514EF312287C"),
            value: "1000".into(),
            valid_after: "1740672089".into(),
            valid_before: "1740675689".into(),
            nonce: B256::repeat_byte(0x42),
        }
    }

    #[test]
    fn test_parse_decimal_rejects_non_integers() {
        assert_eq!(parse_decimal_u256("1000"), Some(U256::from(1000u64)));
        assert_eq!(parse_decimal_u256("0"), Some(U256::ZERO));
        for bad in ["12.5", "", "-1", "+1", " 1", "1e6", "0x10", "１"] {
            assert_eq!(parse_decimal_u256(bad), None, "{bad:?} must be rejected");
        }
    }

    #[test]
    fn test_parse_decimal_is_lossless_beyond_u128() {
        let max = U256::MAX.to_string();
        assert_eq!(parse_decimal_u256(&max), Some(U256::MAX));
        // 2^256 overflows
        let overflow = "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert_eq!(parse_decimal_u256(overflow), None);
    }

    #[test]
    fn test_invalid_fields_map_to_typed_errors() {
        let mut auth = sample();
        auth.value = "12.5".into();
        assert!(matches!(auth.to_typed(), Err(X402Error::InvalidAmount(v)) if v == "12.5"));

        let mut auth = sample();
        auth.valid_before = "soon".into();
        assert!(matches!(
            auth.to_typed(),
            Err(X402Error::InvalidAuthorization(_))
        ));

        let mut auth = sample();
        auth.valid_before = auth.valid_after.clone();
        assert!(matches!(
            auth.to_typed(),
            Err(X402Error::InvalidAuthorization(_))
        ));
    }

    #[test]
    fn test_digest_matches_eip712_signing_hash() {
        let domain = eip712_domain! {
            name: "USDC",
            version: "2",
            chain_id: 10087,
            verifying_contract: address!("0x9be8Df37C788B244cFc28E46654aD5Ec28a880AF"),
        };
        let separator = DomainSeparator::from(domain.separator());
        let auth = sample();
        let digest = auth.digest(&separator).unwrap();
        assert_eq!(
            digest,
            auth.to_typed().unwrap().eip712_signing_hash(&domain)
        );
        // recomputing yields the same bytes
        assert_eq!(digest, auth.digest(&separator).unwrap());
    }

    #[test]
    fn test_fresh_authorizations_differ_in_nonce_and_digest() {
        let from = address!("0x857b06519E91e3A54538791bDbb0E22373e36b66");
        let to = address!("0x209693Bc6afc0C5328bA36FaF03C514EF312287C");
        let window = Duration::from_secs(3600);
        let a = Authorization::fresh(from, to, U256::from(1000u64), window);
        let b = Authorization::fresh(from, to, U256::from(1000u64), window);
        assert_ne!(a.nonce, b.nonce);

        let separator = DomainSeparator::from(B256::repeat_byte(7));
        assert_ne!(a.digest(&separator).unwrap(), b.digest(&separator).unwrap());

        let after: u64 = a.valid_after.parse().unwrap();
        let before: u64 = a.valid_before.parse().unwrap();
        assert_eq!(before - after, 3600);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["value"], "1000");
        assert_eq!(json["validAfter"], "1740672089");
        assert_eq!(
            json["from"],
            "0x857b06519E91e3A54538791bDbb0E22373e36b66"
        );
        assert_eq!(json["to"], "0x209693Bc6afc0C5328bA36FaF03C514EF312287C");

        // lowercase input is accepted and comes back checksummed
        let mut lowered = json.clone();
        lowered["from"] = serde_json::json!("0x857b06519e91e3a54538791bdbb0e22373e36b66");
        let parsed: Authorization = serde_json::from_value(lowered).unwrap();
        assert_eq!(parsed, sample());
        assert_eq!(serde_json::to_value(&parsed).unwrap(), json);
    }
}
