//! Signing ERC-3009 authorizations through an injected signing capability.
//!
//! The signer never sees more than a 32-byte digest (or the typed struct and domain that
//! produce it). Key custody stays with the [`SignerLike`] implementation: a local key,
//! a remote signer, or a hardware wallet with its own locking.

use alloy_primitives::{Address, B256, Bytes, Signature};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{Eip712Domain, SolStruct, eip712_domain};
use async_trait::async_trait;
use std::sync::Arc;
use x402_types::scheme::client::X402Error;

use crate::authorization::Authorization;
use crate::chain::Eip155ChainReference;
use crate::domain_separator::DomainSeparator;

/// The signing capability consumed by the scheme client.
///
/// Alloy's `Signer` is not implemented for `Arc<T>`, and `PrivateKeySigner` is not
/// `Clone`-cheap to share, so this trait covers both.
#[async_trait]
pub trait SignerLike: Send + Sync {
    fn address(&self) -> Address;

    /// Signs a 32-byte digest.
    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error>;

    /// Signs an EIP-712 struct under `domain`.
    async fn sign_typed_data<T>(
        &self,
        payload: &T,
        domain: &Eip712Domain,
    ) -> Result<Signature, alloy_signer::Error>
    where
        T: SolStruct + Send + Sync,
    {
        self.sign_hash(&payload.eip712_signing_hash(domain)).await
    }
}

#[async_trait]
impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        PrivateKeySigner::address(self)
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

#[async_trait]
impl<T: SignerLike + ?Sized> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}

/// Signs `authorization` under an already resolved domain separator.
///
/// Returns the 65-byte `r ‖ s ‖ v` signature.
pub async fn sign_authorization<S>(
    signer: &S,
    authorization: &Authorization,
    separator: &DomainSeparator,
) -> Result<Bytes, X402Error>
where
    S: SignerLike + ?Sized,
{
    let digest = authorization.digest(separator)?;
    let signature = signer
        .sign_hash(&digest)
        .await
        .map_err(|e| X402Error::FailedToSignAuthorization(e.to_string()))?;
    Ok(Bytes::copy_from_slice(&signature.as_bytes()))
}

/// Signs `authorization` under the domain built from the token's name and version.
pub async fn sign_authorization_with_domain<S>(
    signer: &S,
    authorization: &Authorization,
    chain: Eip155ChainReference,
    verifying_contract: Address,
    name: &str,
    version: &str,
) -> Result<Bytes, X402Error>
where
    S: SignerLike + ?Sized,
{
    let typed = authorization.to_typed()?;
    let domain = eip712_domain! {
        name: name.to_owned(),
        version: version.to_owned(),
        chain_id: chain.inner(),
        verifying_contract: verifying_contract,
    };
    let signature = signer
        .sign_typed_data(&typed, &domain)
        .await
        .map_err(|e| X402Error::FailedToSignAuthorization(e.to_string()))?;
    Ok(Bytes::copy_from_slice(&signature.as_bytes()))
}
