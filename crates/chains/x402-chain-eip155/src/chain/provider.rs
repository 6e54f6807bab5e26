//! Read-only chain access for domain separator queries.

use alloy_primitives::{Address, B256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_sol_types::sol;
use async_trait::async_trait;
use tracing::Instrument;
use url::Url;

sol!(
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IEip712Domain {
        function DOMAIN_SEPARATOR() external view returns (bytes32);
    }
);

/// Failure to read a domain separator from chain.
#[derive(Debug, thiserror::Error)]
pub enum DomainSeparatorReadError {
    #[error(transparent)]
    Contract(#[from] alloy_contract::Error),
    #[error("{0}")]
    Other(String),
}

/// Reads the EIP-712 domain separator a token contract reports.
///
/// One reader serves one chain. Implementations must be read-only.
#[async_trait]
pub trait DomainSeparatorReader: Send + Sync {
    async fn domain_separator(&self, asset: Address) -> Result<B256, DomainSeparatorReadError>;
}

/// [`DomainSeparatorReader`] backed by an alloy provider.
#[derive(Debug, Clone)]
pub struct RpcDomainSeparatorReader<P> {
    provider: P,
}

impl<P> RpcDomainSeparatorReader<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl RpcDomainSeparatorReader<DynProvider> {
    /// Connects to a JSON-RPC endpoint over HTTP.
    pub fn http(rpc_url: Url) -> Self {
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_http(rpc_url)
            .erased();
        Self::new(provider)
    }
}

#[async_trait]
impl<P> DomainSeparatorReader for RpcDomainSeparatorReader<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    async fn domain_separator(&self, asset: Address) -> Result<B256, DomainSeparatorReadError> {
        let token = IEip712Domain::new(asset, self.provider.clone());
        let separator = token
            .DOMAIN_SEPARATOR()
            .call()
            .into_future()
            .instrument(tracing::info_span!("fetch_domain_separator", token_contract = %asset))
            .await?;
        Ok(separator)
    }
}
