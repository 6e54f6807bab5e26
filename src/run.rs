use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;
use x402_chain_eip155::V2Eip155ExactClient;
use x402_facilitator_client::FacilitatorClient;
use x402_reqwest::{ReqwestWithPayments, X402Client, settlement_response};

use crate::config::Config;
use crate::telemetry;

/// Command-line x402 client.
#[derive(Parser, Debug)]
#[command(name = "x402-gate")]
#[command(about = "Pay for x402 resources and talk to a Gate Web3 facilitator")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// GET a resource, paying for it when the server answers 402
    Fetch { url: Url },
    /// List the payment kinds the facilitator supports
    Supported,
    /// Ask the facilitator to verify a payment payload
    Verify(PaymentFiles),
    /// Ask the facilitator to settle a payment payload on-chain
    Settle(PaymentFiles),
}

#[derive(Args, Debug)]
struct PaymentFiles {
    /// JSON file holding the signed payment payload
    #[arg(long)]
    payload: PathBuf,
    /// JSON file holding the payment requirements the payload answers
    #[arg(long)]
    requirements: PathBuf,
}

impl PaymentFiles {
    fn read(&self) -> Result<(Vec<u8>, Vec<u8>), Box<dyn std::error::Error>> {
        Ok((read_file(&self.payload)?, read_file(&self.requirements)?))
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    fs::read(path).map_err(|e| format!("Failed to read {}: {e}", path.display()).into())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Runs one command.
///
/// - Loads `.env` variables.
/// - Installs the log subscriber.
/// - Loads the config file, falling back to defaults when it does not exist.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    telemetry::init();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Command::Fetch { url } => fetch(&config, url).await,
        Command::Supported => {
            let facilitator = config.facilitator_client()?;
            print_json(&facilitator.supported().await?)
        }
        Command::Verify(files) => {
            let (payload, requirements) = files.read()?;
            let facilitator = config.facilitator_client()?;
            print_json(&facilitator.verify(&payload, &requirements).await?)
        }
        Command::Settle(files) => {
            let (payload, requirements) = files.read()?;
            settle(&config.facilitator_client()?, &payload, &requirements).await
        }
    }
}

async fn fetch(config: &Config, url: Url) -> Result<(), Box<dyn std::error::Error>> {
    let scheme = V2Eip155ExactClient::new(config.signer()?.clone())
        .with_resolver(Arc::new(config.domain_resolver()?))
        .with_validity(config.validity());
    let x402 = X402Client::new()
        .register(scheme)
        .with_payment_timeout(Some(config.payment_timeout()));
    let http = reqwest::Client::new().with_payments(x402).build();

    let response = http.get(url).send().await?;
    info!(status = %response.status(), "Received response");
    println!("{}", response.status());
    if let Some(settlement) = settlement_response(&response) {
        print_json(&settlement)?;
    }
    println!("{}", response.text().await?);
    Ok(())
}

async fn settle(
    facilitator: &FacilitatorClient,
    payload: &[u8],
    requirements: &[u8],
) -> Result<(), Box<dyn std::error::Error>> {
    match facilitator.settle(payload, requirements).await {
        Ok(settlement) => print_json(&settlement),
        Err(e) => {
            if e.is_outcome_unknown() {
                warn!("The payment may have been settled; check the chain before resubmitting");
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_settle() {
        let cli = Cli::try_parse_from([
            "x402-gate",
            "-c",
            "gate.json",
            "settle",
            "--payload",
            "payload.json",
            "--requirements",
            "requirements.json",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("gate.json"));
        match cli.command {
            Command::Settle(files) => {
                assert_eq!(files.payload, PathBuf::from("payload.json"));
                assert_eq!(files.requirements, PathBuf::from("requirements.json"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_fetch_requires_url() {
        assert!(Cli::try_parse_from(["x402-gate", "fetch", "not a url"]).is_err());
        let cli = Cli::try_parse_from(["x402-gate", "fetch", "http://localhost/premium"]).unwrap();
        assert!(matches!(cli.command, Command::Fetch { .. }));
    }

    #[test]
    fn test_missing_payment_file() {
        let files = PaymentFiles {
            payload: PathBuf::from("/nonexistent/payload.json"),
            requirements: PathBuf::from("/nonexistent/requirements.json"),
        };
        let err = files.read().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/payload.json"));
    }
}
