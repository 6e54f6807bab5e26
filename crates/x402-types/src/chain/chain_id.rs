//! CAIP-2 chain identifiers.
//!
//! A [CAIP-2](https://standards.chainagnostic.org/CAIPs/caip-2) chain id is
//! `namespace:reference`, e.g. `eip155:10087`. Payment requirements in the wild also carry
//! bare network names such as `gatelayer_testnet`; [`ChainId::resolve`] accepts both.
//!
//! ```
//! use x402_types::chain::ChainId;
//!
//! let gate = ChainId::resolve("gatelayer_testnet").unwrap();
//! assert_eq!(gate.to_string(), "eip155:10087");
//! assert_eq!(ChainId::resolve("eip155:10087"), Some(gate));
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;

use crate::networks;

/// A CAIP-2 compliant blockchain identifier.
///
/// Serializes to and from the colon-separated string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    /// The blockchain namespace (e.g., `eip155` for EVM chains).
    pub namespace: String,
    /// The chain-specific reference (e.g., `8453` for Base).
    pub reference: String,
}

impl ChainId {
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Looks up a well-known network name in [`crate::networks`].
    pub fn from_network_name(network_name: &str) -> Option<Self> {
        networks::chain_id_by_network_name(network_name).cloned()
    }

    /// Returns the well-known network name for this chain id, if any.
    pub fn as_network_name(&self) -> Option<&'static str> {
        networks::network_name_by_chain_id(self)
    }

    /// Resolves the `network` field of a payment offer.
    ///
    /// Strings containing a colon are parsed as CAIP-2, anything else is looked up
    /// as a known network name. Returns `None` for malformed ids and unknown names.
    pub fn resolve(network: &str) -> Option<Self> {
        if network.contains(':') {
            network.parse().ok()
        } else {
            Self::from_network_name(network)
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.to_string()
    }
}

/// Error returned when parsing an invalid chain id string.
#[derive(Debug, thiserror::Error)]
#[error("Invalid chain id format {0}")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((namespace, reference)) if !namespace.is_empty() && !reference.is_empty() => {
                Ok(ChainId::new(namespace, reference))
            }
            _ => Err(ChainIdFormatError(s.into())),
        }
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChainId::from_str(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_serde() {
        let chain_id = ChainId::new("eip155", "10087");
        let serialized = serde_json::to_string(&chain_id).unwrap();
        assert_eq!(serialized, "\"eip155:10087\"");
        let deserialized: ChainId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, chain_id);
    }

    #[test]
    fn test_chain_id_rejects_malformed() {
        assert!("invalid".parse::<ChainId>().is_err());
        assert!(":10087".parse::<ChainId>().is_err());
        assert!("eip155:".parse::<ChainId>().is_err());
        assert!(serde_json::from_str::<ChainId>("\"invalid\"").is_err());
    }

    #[test]
    fn test_unknown_namespace_still_parses() {
        let chain_id: ChainId = "unknown:1".parse().unwrap();
        assert_eq!(chain_id.namespace(), "unknown");
    }

    #[test]
    fn test_resolve_accepts_names_and_caip2() {
        let by_name = ChainId::resolve("gatelayer_testnet").unwrap();
        assert_eq!(by_name, ChainId::new("eip155", "10087"));
        assert_eq!(by_name.as_network_name(), Some("gatelayer_testnet"));

        let base = ChainId::resolve("eip155:8453").unwrap();
        assert_eq!(base.as_network_name(), Some("base"));

        // CAIP-2 ids outside the registry still resolve
        assert_eq!(
            ChainId::resolve("eip155:999999"),
            Some(ChainId::new("eip155", "999999"))
        );
    }

    #[test]
    fn test_resolve_rejects_unknown_names() {
        assert!(ChainId::resolve("moonbase").is_none());
        assert!(ChainId::resolve("").is_none());
        assert!(ChainId::resolve("eip155:").is_none());
    }
}
