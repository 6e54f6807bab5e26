//! Configuration for the `x402-gate` command-line client.
//!
//! Every field has a default, so an empty `{}` file is valid. Secrets can be given as
//! `$VAR` references and are resolved from the environment while loading.

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use url::Url;
use x402_chain_eip155::chain::{Eip155ChainReference, RpcDomainSeparatorReader};
use x402_chain_eip155::{ChainSeparators, DomainSeparator, DomainSeparatorResolver, PinnedSeparators};
use x402_facilitator_client::{Credentials, FacilitatorClient, FacilitatorClientError};
use x402_types::chain::ChainId;
use x402_types::config::LiteralOrEnv;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    facilitator: FacilitatorConfig,
    /// RPC endpoints used to read domain separators, keyed by CAIP-2 id or network name.
    #[serde(default)]
    rpc: BTreeMap<String, Url>,
    #[serde(default)]
    signer: Option<LiteralOrEnv<PrivateKeySigner>>,
    #[serde(default = "config_defaults::default_validity_seconds")]
    validity_seconds: u64,
    #[serde(default = "config_defaults::default_payment_timeout_seconds")]
    payment_timeout_seconds: u64,
    #[serde(default)]
    pinned: Vec<PinnedSeparatorConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorConfig {
    /// Defaults to the Gate Web3 test gateway.
    #[serde(default)]
    url: Option<Url>,
    #[serde(default = "config_defaults::default_facilitator_timeout_seconds")]
    timeout_seconds: u64,
    /// Falls back to `GATE_WEB3_*` environment variables when absent.
    #[serde(default)]
    credentials: Option<CredentialsConfig>,
}

impl Default for FacilitatorConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_seconds: config_defaults::default_facilitator_timeout_seconds(),
            credentials: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsConfig {
    api_key: LiteralOrEnv<String>,
    api_secret: LiteralOrEnv<String>,
    #[serde(default)]
    passphrase: Option<LiteralOrEnv<String>>,
    #[serde(default)]
    forwarded_for: Option<LiteralOrEnv<String>>,
}

impl CredentialsConfig {
    fn credentials(&self) -> Credentials {
        let mut credentials = Credentials::new(self.api_key.trim(), self.api_secret.trim());
        if let Some(passphrase) = &self.passphrase {
            credentials = credentials.with_passphrase(passphrase.trim());
        }
        if let Some(forwarded_for) = &self.forwarded_for {
            credentials = credentials.with_forwarded_for(forwarded_for.trim());
        }
        credentials
    }
}

/// An extra pinned domain separator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedSeparatorConfig {
    network: String,
    asset: Address,
    separator: DomainSeparator,
}

mod config_defaults {
    pub fn default_validity_seconds() -> u64 {
        3600
    }

    pub fn default_payment_timeout_seconds() -> u64 {
        30
    }

    pub fn default_facilitator_timeout_seconds() -> u64 {
        30
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("Unknown network {0}")]
    UnknownNetwork(String),
    #[error("Network {0} is not an EVM network")]
    NotEvmNetwork(String),
    #[error("No signer configured; set \"signer\" in the config file")]
    MissingSigner,
    #[error(transparent)]
    Facilitator(#[from] FacilitatorClientError),
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Config::load(path) {
            Err(ConfigError::FileRead(path, e)) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(serde_json::from_str("{}")?)
            }
            other => other,
        }
    }

    pub fn signer(&self) -> Result<&PrivateKeySigner, ConfigError> {
        self.signer
            .as_ref()
            .map(|signer| signer.inner())
            .ok_or(ConfigError::MissingSigner)
    }

    pub fn validity(&self) -> Duration {
        Duration::from_secs(self.validity_seconds)
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_timeout_seconds)
    }

    /// Facilitator client with configured credentials, or credentials from the environment.
    pub fn facilitator_client(&self) -> Result<FacilitatorClient, ConfigError> {
        let facilitator = &self.facilitator;
        let client = match &facilitator.url {
            Some(url) => FacilitatorClient::try_new(url.clone())?,
            None => FacilitatorClient::try_default()?,
        };
        let client = client.with_timeout(Duration::from_secs(facilitator.timeout_seconds));
        let client = match &facilitator.credentials {
            Some(credentials) => client.with_credentials(credentials.credentials()),
            None => client,
        };
        Ok(client)
    }

    /// Resolver seeded with the built-in pins plus configured pins, reading from configured RPCs.
    pub fn domain_resolver(&self) -> Result<DomainSeparatorResolver, ConfigError> {
        let pinned = PinnedSeparators::with_defaults();
        for entry in &self.pinned {
            pinned.pin(eip155_chain(&entry.network)?, entry.asset, entry.separator);
        }
        let mut chain = ChainSeparators::new();
        for (network, rpc_url) in &self.rpc {
            chain = chain.with_reader(
                eip155_chain(network)?,
                RpcDomainSeparatorReader::http(rpc_url.clone()),
            );
        }
        Ok(DomainSeparatorResolver::new(pinned, chain))
    }
}

fn eip155_chain(network: &str) -> Result<Eip155ChainReference, ConfigError> {
    let chain_id =
        ChainId::resolve(network).ok_or_else(|| ConfigError::UnknownNetwork(network.to_string()))?;
    Eip155ChainReference::try_from(&chain_id)
        .map_err(|_| ConfigError::NotEvmNetwork(network.to_string()))
}
