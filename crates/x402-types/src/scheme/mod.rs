//! Payment schemes.
//!
//! A scheme is a named payment mechanism (`exact`) bound to a chain namespace (`eip155`).
//! Scheme implementations live in the chain crates; this module holds the contracts they
//! implement.

pub mod client;

/// Identifies a scheme implementation by protocol version, namespace and scheme name.
pub trait X402SchemeId {
    fn x402_version(&self) -> u8 {
        2
    }

    /// CAIP-2 namespace this scheme handles, e.g. `eip155`.
    fn namespace(&self) -> &str;

    /// Scheme name, e.g. `exact`.
    fn scheme(&self) -> &str;
}
