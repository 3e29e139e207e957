//! Core types for the chaincode client SDK.
//!
//! This crate defines the data shared between the client and its callers:
//! configuration, peer endpoints, the chaincode descriptor, the JSON-RPC
//! envelope, chain statistics, and the error taxonomy. It contains no I/O.

pub mod chain;
pub mod chaincode;
pub mod config;
pub mod envelope;
pub mod error;
pub mod peer;
