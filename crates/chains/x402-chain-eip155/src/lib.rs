//! EIP-155 (EVM) client support for the x402 payment protocol.
//!
//! Builds and signs ERC-3009 `transferWithAuthorization` payments for the V2 "exact"
//! scheme on EVM chains.
//!
//! # Architecture
//!
//! - [`authorization`] - the payment intent and its EIP-712 digest
//! - [`domain_separator`] - pinned, on-chain and locally computed domain separators
//! - [`signer`] - signing through an injected [`SignerLike`] capability
//! - [`v2_eip155_exact`] - the scheme client plugged into the payment middleware
//! - [`chain`] - chain references, token deployments and contract reads
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use alloy_signer_local::PrivateKeySigner;
//! use x402_chain_eip155::{
//!     ChainSeparators, DomainSeparatorResolver, PinnedSeparators, V2Eip155ExactClient,
//! };
//! use x402_chain_eip155::chain::{Eip155ChainReference, RpcDomainSeparatorReader};
//!
//! let chain = ChainSeparators::new().with_reader(
//!     Eip155ChainReference::new(10087),
//!     RpcDomainSeparatorReader::http("https://gatelayer-testnet.gatenode.cc".parse()?),
//! );
//! let resolver = DomainSeparatorResolver::new(PinnedSeparators::with_defaults(), chain);
//! let client = V2Eip155ExactClient::new(PrivateKeySigner::random())
//!     .with_resolver(Arc::new(resolver));
//! ```

pub mod authorization;
pub mod chain;
pub mod domain_separator;
pub mod signer;
pub mod v2_eip155_exact;

mod networks;
pub use networks::*;

pub use authorization::Authorization;
pub use domain_separator::{
    ChainSeparators, DomainSeparator, DomainSeparatorResolver, PinnedSeparators,
};
pub use signer::SignerLike;
pub use v2_eip155_exact::{V2Eip155Exact, V2Eip155ExactClient};
