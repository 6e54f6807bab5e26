//! Chain identifiers for x402 payment processing.
//!
//! - [`ChainId`] - A CAIP-2 compliant chain identifier (e.g., `eip155:10087` for Gate Layer testnet)

mod chain_id;

pub use chain_id::*;
