//! V2 EIP-155 "exact" payment scheme.
//!
//! The buyer signs an ERC-3009 `transferWithAuthorization` for exactly the offered amount.
//! Offers are addressed by CAIP-2 chain id (`eip155:10087`) or by a known network name
//! (`gatelayer_testnet`).

pub mod client;
pub use client::*;

pub mod types;
pub use types::*;

use x402_types::scheme::X402SchemeId;

pub struct V2Eip155Exact;

impl X402SchemeId for V2Eip155Exact {
    fn namespace(&self) -> &str {
        crate::chain::EIP155_NAMESPACE
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}
