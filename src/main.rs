//! `x402-gate`: a command-line x402 client.
//!
//! Commands:
//! - `fetch <url>` – GET a resource, paying for it if the server answers 402
//! - `supported` – list the payment kinds the facilitator supports
//! - `verify` – ask the facilitator to verify a payment payload
//! - `settle` – ask the facilitator to settle a payment payload on-chain
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG` names the JSON config file (default `config.json`)
//! - `RUST_LOG` controls log verbosity
//! - `GATE_WEB3_*` facilitator credentials when the config file has none

mod config;
mod run;
mod telemetry;

use std::process;

use crate::run::run;

#[tokio::main]
async fn main() {
    let result = run().await;
    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1)
    }
}
