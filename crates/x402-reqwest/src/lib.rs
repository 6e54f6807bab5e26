//! Reqwest middleware that pays for [x402](https://www.x402.org) protected resources.
//!
//! When a request is answered with `402 Payment Required`, the middleware reads the offers,
//! lets a registered scheme client sign one, and resends the request once with the payment
//! header. A second 402 is reported as [`X402Error::PaymentVerificationFailed`].
//!
//! ## Quickstart
//!
//! ```rust,ignore
//! use x402_reqwest::{ReqwestWithPayments, X402Client, settlement_response};
//! use x402_chain_eip155::V2Eip155ExactClient;
//! use alloy_signer_local::PrivateKeySigner;
//!
//! let signer: PrivateKeySigner = "PRIVATE_KEY".parse()?;
//! let http = reqwest::Client::new()
//!     .with_payments(X402Client::new().register(V2Eip155ExactClient::new(signer)))
//!     .build();
//!
//! let response = http.get("https://api.example.com/premium").send().await?;
//! if let Some(settlement) = settlement_response(&response) {
//!     println!("paid: {settlement:?}");
//! }
//! ```
//!
//! ## Payment Selection
//!
//! Candidates from every registered scheme are ordered by the server's offer order and
//! handed to a [`PaymentSelector`]. The default [`FirstMatch`] pays the first one.
//! See [`X402Client::with_selector`].
//!
//! ## Errors
//!
//! Payment failures surface as [`reqwest_middleware::Error::Middleware`]. Use [`x402_error`]
//! to get the underlying [`X402Error`] back.

mod builder;
mod client;

pub use builder::*;
pub use client::*;
pub use x402_types::scheme::client::{FirstMatch, PaymentSelector, X402Error};
