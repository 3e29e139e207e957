//! Peer endpoint types.

use crate::config::PeerConfig;
use serde::{Deserialize, Serialize};

/// Number of leading id characters shown in a peer's friendly name.
const FRIENDLY_ID_PREFIX: usize = 12;

/// A configured peer endpoint.
///
/// Everything except `identity` is fixed once the network is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerEndpoint {
    /// Peer identifier.
    pub id: String,
    /// REST endpoint hostname.
    pub host: String,
    /// Plain HTTP port.
    pub plain_port: Option<u16>,
    /// TLS port.
    pub tls_port: Option<u16>,
    /// Whether requests to this peer use TLS.
    pub use_tls: bool,
    /// Display name, e.g. `vp0-abc123_vp0...:7051`.
    pub friendly_name: String,
    /// Identity remembered after a successful registration.
    #[serde(default)]
    pub identity: Option<String>,
}

impl PeerEndpoint {
    /// Build an endpoint from its declaration.
    pub fn from_config(config: &PeerConfig, use_tls: bool) -> Self {
        let port = if use_tls {
            config.api_port_tls
        } else {
            config.api_port
        };
        Self {
            id: config.id.clone(),
            host: config.api_host.clone(),
            plain_port: config.api_port,
            tls_port: config.api_port_tls,
            use_tls,
            friendly_name: friendly_name(&config.id, port),
            identity: None,
        }
    }

    /// The port requests go to, picked by the TLS flag.
    pub fn port(&self) -> u16 {
        let port = if self.use_tls {
            self.tls_port
        } else {
            self.plain_port
        };
        port.unwrap_or_default()
    }

    /// Connection target for this peer.
    pub fn target(&self) -> PeerTarget {
        PeerTarget {
            host: self.host.clone(),
            port: self.port(),
            tls: self.use_tls,
        }
    }
}

/// Where a single request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerTarget {
    /// Hostname.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Use `https`.
    pub tls: bool,
}

impl std::fmt::Display for PeerTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = if self.tls { "https" } else { "http" };
        write!(f, "{scheme}://{}:{}", self.host, self.port)
    }
}

/// `"<id after the first '_'>-<first 12 chars of id>...:<port>"`.
pub fn friendly_name(id: &str, port: Option<u16>) -> String {
    let suffix = id.split_once('_').map(|(_, rest)| rest).unwrap_or(id);
    let prefix: String = id.chars().take(FRIENDLY_ID_PREFIX).collect();
    let port = port.map(|p| p.to_string()).unwrap_or_default();
    format!("{suffix}-{prefix}...:{port}")
}
