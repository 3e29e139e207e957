//! Chaincode client. Talks to a ledger peer's HTTP RPC endpoint.
//!
//! Wraps a remote chaincode behind local callables, keeps track of which
//! peer and identity calls go out as, and watches chain height so callers
//! learn when their invokes have landed in a block.
//!
//! ## Architecture
//!
//! - **ChaincodeClient**: Owns the peer directory, capability registry, and monitor state
//! - **CapabilityRegistry**: Declared invoke/query names and their dispatch
//! - **Registration**: `/registrar` enrollment with fixed-delay retry
//! - **Monitor**: Background height polling driven by the [`actions::ActionQueue`]
//! - **Transport**: Trait seam over HTTP(S); [`HttpTransport`] is the default

pub mod actions;
pub mod capability;
pub mod client;
pub mod config;
pub mod deploy;
pub mod monitor;
pub mod peers;
pub mod persist;
pub mod registration;
pub mod request_id;
pub mod transport;

pub use capability::{CapabilityRegistry, FunctionKind, InvokeStub, QueryStub};
pub use client::ChaincodeClient;
pub use config::{load_options, ClientConfig};
pub use deploy::DeployOptions;
pub use monitor::{MonitorConfig, MonitorHandle};
pub use registration::RegistrationState;
pub use transport::{HttpTransport, Transport, TransportFailure, TransportRequest, TransportResponse};

pub use chaincode_types;
