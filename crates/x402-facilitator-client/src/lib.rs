//! Client for a remote x402 facilitator exposed through the Gate Web3 OpenAPI gateway.
//!
//! The facilitator verifies signed payment payloads and settles them on-chain. It sits
//! behind one endpoint that dispatches on an `action` field, and every request is
//! authenticated with an HMAC-SHA256 signature over the exact body bytes.
//!
//! ## Example
//!
//! ```no_run
//! use x402_facilitator_client::{Credentials, FacilitatorClient};
//!
//! # async fn run(payload: Vec<u8>, requirements: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let facilitator = FacilitatorClient::try_default()?
//!     .with_credentials(Credentials::new("api-key", "api-secret"));
//! // A rejected payload comes back as `FacilitatorClientError::VerifyRejected`.
//! facilitator.verify(&payload, &requirements).await?;
//! let settled = facilitator.settle(&payload, &requirements).await?;
//! println!("{settled:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! [`FacilitatorClientError`] separates transport failures, business rejections with their
//! reason and payer, and settle calls whose outcome is unknown.

mod auth;
mod client;
mod error;

pub use auth::*;
pub use client::*;
pub use error::*;
