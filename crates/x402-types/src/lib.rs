#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the x402 payment protocol.
//!
//! This crate holds everything the client side of an HTTP 402 flow needs to agree on
//! with resource servers and facilitators, without committing to a particular chain:
//!
//! - [`chain`] - CAIP-2 chain identifiers and network name resolution
//! - [`config`] - Configuration values that may reference environment variables
//! - [`networks`] - Registry of well-known networks and their CAIP-2 ids
//! - [`proto`] - Wire format types for protocol messages (V1 and V2)
//! - [`scheme`] - The scheme-client contract, payment selection, and the client error taxonomy
//! - [`timestamp`] - Unix timestamps for authorization validity windows
//! - [`util`] - Base64 helpers
//!
//! # Protocol Versions
//!
//! - **V1** ([`proto::v1`]): requirements in the 402 body, network names such as `"base-sepolia"`
//! - **V2** ([`proto::v2`]): requirements in the `Payment-Required` header, CAIP-2 ids such as
//!   `"eip155:84532"` (known network names are still accepted)

pub mod chain;
pub mod config;
pub mod networks;
pub mod proto;
pub mod scheme;
pub mod timestamp;
pub mod util;
