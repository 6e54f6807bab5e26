//! EVM chain support: chain references, token deployments, and read-only contract access.
//!
//! - [`Eip155ChainReference`] - numeric chain id of an EVM network
//! - [`Eip155TokenDeployment`] - a token contract with its EIP-712 domain parameters
//! - [`DomainSeparatorReader`] - reads `DOMAIN_SEPARATOR()` from a token contract

pub mod provider;
pub use provider::*;

pub mod types;
pub use types::*;
