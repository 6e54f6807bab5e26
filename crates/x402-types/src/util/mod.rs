//! Utility types for x402.
//!
//! - [`b64`] - Base64 encoding/decoding used by the payment headers

pub mod b64;

pub use b64::*;
