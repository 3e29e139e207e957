//! Peer directory: the ordered list of configured peers, the selected
//! peer, and the identity last registered against each peer.

use chaincode_types::config::{NetworkOptions, PeerConfig};
use chaincode_types::error::{SdkError, SdkResult};
use chaincode_types::peer::{PeerEndpoint, PeerTarget};
use tracing::{error, info};

/// Ordered peers plus the index requests currently go to.
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory {
    peers: Vec<PeerEndpoint>,
    selected: usize,
}

impl PeerDirectory {
    /// Validate peer declarations and build the directory.
    ///
    /// Every missing field across all peers is reported in one error.
    /// Peer 0 is selected.
    pub fn from_configs(configs: &[PeerConfig], options: &NetworkOptions) -> SdkResult<Self> {
        let errors = validate_peers(configs, options.tls);
        if !errors.is_empty() {
            error!(?errors, "Input error in network()");
            return Err(SdkError::input("network()", errors));
        }

        let peers: Vec<PeerEndpoint> = configs
            .iter()
            .map(|c| PeerEndpoint::from_config(c, options.tls))
            .collect();
        for peer in &peers {
            info!(peer = %peer.friendly_name, "Peer loaded");
        }

        Ok(Self { peers, selected: 0 })
    }

    /// Select the peer subsequent chaincode calls go to.
    ///
    /// Returns `false`, leaving the selection unchanged, if `index` is out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.peers.len() {
            self.selected = index;
            true
        } else {
            false
        }
    }

    /// Index of the selected peer.
    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// The selected peer.
    pub fn selected(&self) -> Option<&PeerEndpoint> {
        self.peers.get(self.selected)
    }

    /// Peer at `index`.
    pub fn get(&self, index: usize) -> Option<&PeerEndpoint> {
        self.peers.get(index)
    }

    /// Target of the peer at `index`.
    pub fn target(&self, index: usize) -> SdkResult<PeerTarget> {
        self.get(index)
            .map(PeerEndpoint::target)
            .ok_or(SdkError::PeerNotFound(index))
    }

    /// Target of the selected peer.
    pub fn selected_target(&self) -> SdkResult<PeerTarget> {
        self.target(self.selected)
    }

    /// Identity remembered for the selected peer.
    pub fn selected_identity(&self) -> Option<String> {
        self.selected().and_then(|p| p.identity.clone())
    }

    /// Remember `identity` as registered against the peer at `index`.
    pub fn remember_identity(&mut self, index: usize, identity: &str) {
        if let Some(peer) = self.peers.get_mut(index) {
            peer.identity = Some(identity.to_string());
        }
    }

    /// Forget the identity remembered for the peer at `index`.
    pub fn forget_identity(&mut self, index: usize) {
        if let Some(peer) = self.peers.get_mut(index) {
            peer.identity = None;
        }
    }

    /// All peers, in declaration order.
    pub fn peers(&self) -> &[PeerEndpoint] {
        &self.peers
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peers are configured.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

fn validate_peers(configs: &[PeerConfig], tls: bool) -> Vec<String> {
    let mut errors = Vec::new();
    if configs.is_empty() {
        errors.push("network input arg should contain at least one peer".to_string());
    }
    for (i, peer) in configs.iter().enumerate() {
        if peer.id.is_empty() {
            errors.push(format!("peer {i} is missing the field id"));
        }
        if peer.api_host.is_empty() {
            errors.push(format!("peer {i} is missing the field api_host"));
        }
        if tls {
            if peer.api_port_tls.is_none() {
                errors.push(format!("peer {i} is missing the field api_port_tls"));
            }
        } else if peer.api_port.is_none() {
            errors.push(format!("peer {i} is missing the field api_port"));
        }
    }
    errors
}
