//! Configuration consumed by the client: network peers, membership users,
//! network options, and the chaincode declaration.
//!
//! Field names follow the established JSON layout of peer network files
//! (`api_host`, `api_port_tls`, `enrollId`, ...), so existing network
//! descriptions deserialize unchanged.

use serde::{Deserialize, Serialize};

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Default registration retry budget (retries after the first attempt).
pub const DEFAULT_MAX_RETRY: u32 = 2;

/// Network-wide options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkOptions {
    /// Suppress per-request transport logging.
    pub quiet: bool,
    /// Request timeout in milliseconds.
    pub timeout: u64,
    /// Talk to peers over TLS (uses `api_port_tls`) or plain HTTP (`api_port`).
    pub tls: bool,
    /// Registration retries after the first attempt.
    pub max_retry: u32,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            quiet: true,
            timeout: DEFAULT_TIMEOUT_MS,
            tls: true,
            max_retry: DEFAULT_MAX_RETRY,
        }
    }
}

/// A peer as declared in the network description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Peer identifier, e.g. `"abc123_vp0"`.
    #[serde(default)]
    pub id: String,
    /// Hostname of the peer's REST endpoint.
    #[serde(default)]
    pub api_host: String,
    /// Plain HTTP port.
    #[serde(default)]
    pub api_port: Option<u16>,
    /// TLS port.
    #[serde(default)]
    pub api_port_tls: Option<u16>,
}

/// Membership credentials for one peer (matched by position).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    /// Enrollment identity.
    pub enroll_id: String,
    /// Enrollment secret.
    pub enroll_secret: String,
}

/// The network description passed to `load`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Ordered peer list. `None` means the field was absent.
    #[serde(default)]
    pub peers: Option<Vec<PeerConfig>>,
    /// Membership users; `users[i]` registers against `peers[i]`.
    #[serde(default)]
    pub users: Vec<UserConfig>,
    /// Network-wide options.
    #[serde(default)]
    pub options: Option<NetworkOptions>,
}

/// Declaration of the remote chaincode and its callable functions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeOptions {
    /// Name of an already deployed chaincode, if any.
    #[serde(default, alias = "deploy_name")]
    pub deployed_name: Option<String>,
    /// Source locator handed to the peer on deploy.
    #[serde(default)]
    pub git_url: String,
    /// Chaincode version string.
    #[serde(default)]
    pub version: Option<String>,
    /// Declared state-changing function names.
    #[serde(default)]
    pub invoke: Vec<String>,
    /// Declared read-only function names.
    #[serde(default)]
    pub query: Vec<String>,
}

/// Everything `load` needs: the network and the chaincode declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Network description.
    #[serde(default)]
    pub network: Option<NetworkConfig>,
    /// Chaincode declaration.
    #[serde(default)]
    pub chaincode: ChaincodeOptions,
}
