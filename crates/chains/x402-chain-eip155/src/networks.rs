use alloy_primitives::address;

use crate::chain::{Eip155ChainReference, Eip155TokenDeployment, TokenDeploymentEip712};

/// Per-network instances for the EVM networks this crate knows about.
///
/// Implemented for [`USDC`] to get the default payment asset of each network.
///
/// ```
/// use x402_chain_eip155::{KnownNetworkEip155, USDC};
///
/// let usdc = USDC::gatelayer_testnet();
/// assert_eq!(usdc.chain_reference.inner(), 10087);
/// assert_eq!(usdc.decimals, 6);
/// ```
pub trait KnownNetworkEip155<A> {
    /// Gate Layer testnet (eip155:10087)
    fn gatelayer_testnet() -> A;
    /// Base mainnet (eip155:8453)
    fn base() -> A;
    /// Base Sepolia testnet (eip155:84532)
    fn base_sepolia() -> A;
    /// Polygon mainnet (eip155:137)
    fn polygon() -> A;
    /// Polygon Amoy testnet (eip155:80002)
    fn polygon_amoy() -> A;
    /// Avalanche C-Chain mainnet (eip155:43114)
    fn avalanche() -> A;
    /// Avalanche Fuji testnet (eip155:43113)
    fn avalanche_fuji() -> A;
}

/// USDC deployments, the default asset when an offer names none.
pub struct USDC;

impl USDC {
    /// Default USDC deployment on the given chain, if one is known.
    pub fn by_chain(chain: Eip155ChainReference) -> Option<Eip155TokenDeployment> {
        let deployment = match chain.inner() {
            10087 => Self::gatelayer_testnet(),
            8453 => Self::base(),
            84532 => Self::base_sepolia(),
            137 => Self::polygon(),
            80002 => Self::polygon_amoy(),
            43114 => Self::avalanche(),
            43113 => Self::avalanche_fuji(),
            _ => return None,
        };
        Some(deployment)
    }
}

fn usdc(chain: u64, address: alloy_primitives::Address, name: &str) -> Eip155TokenDeployment {
    Eip155TokenDeployment {
        chain_reference: Eip155ChainReference::new(chain),
        address,
        decimals: 6,
        eip712: Some(TokenDeploymentEip712 {
            name: name.into(),
            version: "2".into(),
        }),
    }
}

impl KnownNetworkEip155<Eip155TokenDeployment> for USDC {
    fn gatelayer_testnet() -> Eip155TokenDeployment {
        usdc(
            10087,
            address!("0x9be8Df37C788B244cFc28E46654aD5Ec28a880AF"),
            "USDC",
        )
    }

    fn base() -> Eip155TokenDeployment {
        usdc(
            8453,
            address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            "USD Coin",
        )
    }

    fn base_sepolia() -> Eip155TokenDeployment {
        usdc(
            84532,
            address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
            "USDC",
        )
    }

    fn polygon() -> Eip155TokenDeployment {
        usdc(
            137,
            address!("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
            "USDC",
        )
    }

    fn polygon_amoy() -> Eip155TokenDeployment {
        usdc(
            80002,
            address!("0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582"),
            "USDC",
        )
    }

    fn avalanche() -> Eip155TokenDeployment {
        usdc(
            43114,
            address!("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
            "USD Coin",
        )
    }

    fn avalanche_fuji() -> Eip155TokenDeployment {
        usdc(
            43113,
            address!("0x5425890298aed601595a70AB815c96711a31Bc65"),
            "USD Coin",
        )
    }
}
