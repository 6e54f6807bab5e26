//! Resolution of the EIP-712 domain separator a signature is bound to.
//!
//! A wrong separator produces a signature the token contract rejects, so resolution goes
//! through an explicit ordered list of sources, first hit wins:
//!
//! 1. [`PinnedSeparators`] - known-good values, no network round trip
//! 2. [`ChainSeparators`] - `DOMAIN_SEPARATOR()` read from the token contract
//! 3. [`LocalSeparator`] - recomputed from token name, version, chain id and contract
//!
//! Pinned values are a cache, not constants: a redeployed token makes its pin stale, so
//! pins can be replaced or invalidated at runtime.

use alloy_primitives::{Address, B256, address, b256};
use alloy_sol_types::eip712_domain;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use x402_types::scheme::client::X402Error;

use crate::chain::{DomainSeparatorReader, Eip155ChainReference};

/// A 32-byte EIP-712 domain separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainSeparator(B256);

impl DomainSeparator {
    pub fn as_b256(&self) -> &B256 {
        &self.0
    }

    /// Computes the separator of `EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)`.
    pub fn compute(
        name: &str,
        version: &str,
        chain: Eip155ChainReference,
        verifying_contract: Address,
    ) -> Self {
        let domain = eip712_domain! {
            name: name.to_owned(),
            version: version.to_owned(),
            chain_id: chain.inner(),
            verifying_contract: verifying_contract,
        };
        Self(domain.separator())
    }
}

impl From<B256> for DomainSeparator {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl FromStr for DomainSeparator {
    type Err = alloy_primitives::hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(B256::from_str(s)?))
    }
}

impl fmt::Display for DomainSeparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which source produced a separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparatorProvenance {
    Pinned,
    OnChain,
    Local,
}

impl fmt::Display for SeparatorProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SeparatorProvenance::Pinned => "pinned",
            SeparatorProvenance::OnChain => "on-chain",
            SeparatorProvenance::Local => "local",
        };
        f.write_str(s)
    }
}

/// Everything a source may need to produce a separator.
#[derive(Debug, Clone)]
pub struct DomainQuery {
    pub chain: Eip155ChainReference,
    pub asset: Address,
    /// EIP-712 domain name, from the offer's `extra` or the asset defaults.
    pub name: Option<String>,
    /// EIP-712 domain version, from the offer's `extra` or the asset defaults.
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSeparator {
    pub separator: DomainSeparator,
    pub provenance: SeparatorProvenance,
}

/// One tier of the resolution policy.
///
/// `Ok(None)` passes the query on to the next source. An `Err` stops resolution.
#[async_trait]
pub trait DomainSeparatorSource: Send + Sync {
    fn provenance(&self) -> SeparatorProvenance;

    async fn lookup(&self, query: &DomainQuery) -> Result<Option<DomainSeparator>, X402Error>;
}

/// USDC on Gate Layer testnet.
const GATELAYER_TESTNET_USDC: Address = address!("0x9be8Df37C788B244cFc28E46654aD5Ec28a880AF");
const GATELAYER_TESTNET_USDC_SEPARATOR: B256 =
    b256!("0x2c2d6b621e73a4a094449d1894717413742130fb20149ec48340ca0354d1a707");

/// Known-good separators keyed by (chain, asset).
///
/// Cheap to clone; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct PinnedSeparators {
    entries: Arc<DashMap<(Eip155ChainReference, Address), DomainSeparator>>,
}

impl PinnedSeparators {
    /// An empty cache.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A cache seeded with the separators of assets whose domain is known not to rotate.
    pub fn with_defaults() -> Self {
        let pins = Self::empty();
        pins.pin(
            Eip155ChainReference::new(10087),
            GATELAYER_TESTNET_USDC,
            DomainSeparator::from(GATELAYER_TESTNET_USDC_SEPARATOR),
        );
        pins
    }

    /// Adds or replaces a pin.
    pub fn pin(&self, chain: Eip155ChainReference, asset: Address, separator: DomainSeparator) {
        self.entries.insert((chain, asset), separator);
    }

    /// Drops a pin, returning the removed value.
    pub fn invalidate(
        &self,
        chain: Eip155ChainReference,
        asset: Address,
    ) -> Option<DomainSeparator> {
        self.entries.remove(&(chain, asset)).map(|(_, v)| v)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn get(&self, chain: Eip155ChainReference, asset: Address) -> Option<DomainSeparator> {
        self.entries.get(&(chain, asset)).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DomainSeparatorSource for PinnedSeparators {
    fn provenance(&self) -> SeparatorProvenance {
        SeparatorProvenance::Pinned
    }

    async fn lookup(&self, query: &DomainQuery) -> Result<Option<DomainSeparator>, X402Error> {
        Ok(self.get(query.chain, query.asset))
    }
}

pub const DEFAULT_CHAIN_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads separators from token contracts, one reader per chain.
///
/// Chains without a reader pass through. A failed or timed-out read is logged and passes
/// through as well, so the local tier still gets a chance.
pub struct ChainSeparators {
    readers: HashMap<Eip155ChainReference, Arc<dyn DomainSeparatorReader>>,
    timeout: Duration,
}

impl Default for ChainSeparators {
    fn default() -> Self {
        Self {
            readers: HashMap::new(),
            timeout: DEFAULT_CHAIN_QUERY_TIMEOUT,
        }
    }
}

impl ChainSeparators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reader<R>(mut self, chain: Eip155ChainReference, reader: R) -> Self
    where
        R: DomainSeparatorReader + 'static,
    {
        self.readers.insert(chain, Arc::new(reader));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for ChainSeparators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainSeparators")
            .field("chains", &self.readers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl DomainSeparatorSource for ChainSeparators {
    fn provenance(&self) -> SeparatorProvenance {
        SeparatorProvenance::OnChain
    }

    async fn lookup(&self, query: &DomainQuery) -> Result<Option<DomainSeparator>, X402Error> {
        let Some(reader) = self.readers.get(&query.chain) else {
            return Ok(None);
        };
        match tokio::time::timeout(self.timeout, reader.domain_separator(query.asset)).await {
            Ok(Ok(separator)) => Ok(Some(DomainSeparator::from(separator))),
            Ok(Err(error)) => {
                warn!(chain = %query.chain, asset = %query.asset, %error, "Domain separator query failed, falling back");
                Ok(None)
            }
            Err(_) => {
                warn!(chain = %query.chain, asset = %query.asset, timeout = ?self.timeout, "Domain separator query timed out, falling back");
                Ok(None)
            }
        }
    }
}

/// Recomputes the separator from the token's EIP-712 name and version.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSeparator;

#[async_trait]
impl DomainSeparatorSource for LocalSeparator {
    fn provenance(&self) -> SeparatorProvenance {
        SeparatorProvenance::Local
    }

    async fn lookup(&self, query: &DomainQuery) -> Result<Option<DomainSeparator>, X402Error> {
        match (&query.name, &query.version) {
            (Some(name), Some(version)) => Ok(Some(DomainSeparator::compute(
                name,
                version,
                query.chain,
                query.asset,
            ))),
            _ => Err(X402Error::AssetMetadataMissing {
                network: query.chain.as_chain_id().to_string(),
                asset: query.asset.to_string(),
            }),
        }
    }
}

/// Evaluates the sources top-down and returns the first separator found.
pub struct DomainSeparatorResolver {
    pinned: PinnedSeparators,
    sources: Vec<Box<dyn DomainSeparatorSource>>,
}

impl DomainSeparatorResolver {
    /// Pinned, then on-chain, then local.
    pub fn new(pinned: PinnedSeparators, chain: ChainSeparators) -> Self {
        Self {
            pinned: pinned.clone(),
            sources: vec![Box::new(pinned), Box::new(chain), Box::new(LocalSeparator)],
        }
    }

    /// Default pins and local computation, no chain queries.
    pub fn offline() -> Self {
        Self::new(PinnedSeparators::with_defaults(), ChainSeparators::new())
    }

    /// The pinned tier, for adding or invalidating pins at runtime.
    pub fn pinned(&self) -> &PinnedSeparators {
        &self.pinned
    }

    #[instrument(name = "x402.eip155.resolve_domain_separator", skip_all, err, fields(chain = %query.chain, asset = %query.asset))]
    pub async fn resolve(&self, query: &DomainQuery) -> Result<ResolvedSeparator, X402Error> {
        for source in &self.sources {
            if let Some(separator) = source.lookup(query).await? {
                let provenance = source.provenance();
                debug!(%provenance, %separator, "Resolved domain separator");
                return Ok(ResolvedSeparator {
                    separator,
                    provenance,
                });
            }
        }
        Err(X402Error::AssetMetadataMissing {
            network: query.chain.as_chain_id().to_string(),
            asset: query.asset.to_string(),
        })
    }
}

impl Default for DomainSeparatorResolver {
    fn default() -> Self {
        Self::offline()
    }
}

impl fmt::Debug for DomainSeparatorResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainSeparatorResolver")
            .field("pinned", &self.pinned.len())
            .field(
                "sources",
                &self.sources.iter().map(|s| s.provenance()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
