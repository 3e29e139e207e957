//! The client instance: owns the peer directory, the capability registry,
//! and the monitor state, and runs the bulk `load` flow.
//!
//! Every instance is independent. Cloning is cheap and shares state.

use crate::capability::CapabilityRegistry;
use crate::config::ClientConfig;
use crate::monitor::MonitorState;
use crate::peers::PeerDirectory;
use crate::persist;
use crate::request_id::RequestIdClock;
use crate::transport::{
    segment_path, HttpMethod, HttpTransport, Transport, TransportFailure, TransportRequest,
    TransportResponse,
};
use chaincode_types::chain::ChainStats;
use chaincode_types::chaincode::ChaincodeDescriptor;
use chaincode_types::config::{ChaincodeOptions, LoadOptions, NetworkOptions, PeerConfig};
use chaincode_types::error::{SdkError, SdkResult};
use chaincode_types::peer::{PeerEndpoint, PeerTarget};
use futures::future::try_join_all;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, error, info};

pub(crate) struct ClientShared {
    pub(crate) config: ClientConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) options: RwLock<NetworkOptions>,
    pub(crate) peers: RwLock<PeerDirectory>,
    pub(crate) registry: RwLock<CapabilityRegistry>,
    pub(crate) monitor: Mutex<MonitorState>,
    pub(crate) request_ids: RequestIdClock,
}

/// Client for one chaincode on one peer network.
#[derive(Clone)]
pub struct ChaincodeClient {
    pub(crate) shared: Arc<ClientShared>,
}

impl ChaincodeClient {
    /// Create a client that talks HTTP(S) to the peers.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(HttpTransport::new()))
    }

    /// Create a client over a custom transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                config,
                transport,
                options: RwLock::new(NetworkOptions::default()),
                peers: RwLock::new(PeerDirectory::default()),
                registry: RwLock::new(CapabilityRegistry::default()),
                monitor: Mutex::new(MonitorState::default()),
                request_ids: RequestIdClock::new(),
            }),
        }
    }

    /// Client settings.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    // -----------------------------------------------------------------------
    // Startup flow
    // -----------------------------------------------------------------------

    /// Standard startup: load peers, register membership users (if any),
    /// then bind the chaincode's declared functions.
    ///
    /// Users are matched to peers by position and registered concurrently;
    /// the first registration that gives up fails the whole load.
    pub async fn load(&self, options: LoadOptions) -> SdkResult<ChaincodeDescriptor> {
        let Some(network) = options.network.filter(|n| n.peers.is_some()) else {
            let errors = vec!["the option \"network.peers\" is required".to_string()];
            error!(?errors, "Input error in load()");
            return Err(SdkError::input("load()", errors));
        };
        let peers = network.peers.unwrap_or_default();

        self.write_registry(|r| *r = CapabilityRegistry::default());
        self.network(&peers, network.options)?;

        if network.users.is_empty() {
            info!("No membership users found, assuming this is a network without membership");
        } else {
            let max_retry = self.network_options().max_retry;
            let registrations = network
                .users
                .iter()
                .take(peers.len())
                .enumerate()
                .map(|(i, user)| {
                    self.register(i, &user.enroll_id, &user.enroll_secret, Some(max_retry))
                });
            try_join_all(registrations).await?;
        }

        Ok(self.load_chaincode(&options.chaincode))
    }

    /// Configure the peers to talk to. Selects peer 0.
    pub fn network(&self, peers: &[PeerConfig], options: Option<NetworkOptions>) -> SdkResult<()> {
        let options = options.unwrap_or_default();
        let directory = PeerDirectory::from_configs(peers, &options)?;
        *self.shared.options.write().unwrap_or_else(|e| e.into_inner()) = options;
        *self.shared.peers.write().unwrap_or_else(|e| e.into_inner()) = directory;
        Ok(())
    }

    /// Record the chaincode declaration and bind its invoke/query functions.
    pub fn load_chaincode(&self, options: &ChaincodeOptions) -> ChaincodeDescriptor {
        let descriptor = self.write_registry(|registry| {
            registry.declare(options);
            registry.descriptor().clone()
        });
        info!(
            invoke = descriptor.invoke_names.len(),
            query = descriptor.query_names.len(),
            "load_chaincode() finished"
        );
        descriptor
    }

    // -----------------------------------------------------------------------
    // Peer selection
    // -----------------------------------------------------------------------

    /// Send subsequent chaincode calls to the peer at `index`.
    pub fn switch_peer(&self, index: usize) -> bool {
        let switched = self
            .shared
            .peers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .select(index);
        if switched {
            info!(index, "Switched peer");
        }
        switched
    }

    /// The peer chaincode calls currently go to.
    pub fn selected_peer(&self) -> Option<PeerEndpoint> {
        self.read_peers(|p| p.selected().cloned())
    }

    /// Snapshot of all peers.
    pub fn peers(&self) -> Vec<PeerEndpoint> {
        self.read_peers(|p| p.peers().to_vec())
    }

    /// Current network options.
    pub fn network_options(&self) -> NetworkOptions {
        self.shared
            .options
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    // -----------------------------------------------------------------------
    // Chain observation
    // -----------------------------------------------------------------------

    /// Chain height and tip hashes (`GET /chain`).
    ///
    /// Fields beyond height and tip hashes are kept in [`ChainStats::extra`].
    pub async fn chain_stats(&self) -> SdkResult<ChainStats> {
        let body = self.single_shot("chain_stats", "/chain".to_string()).await?;
        serde_json::from_value(body.clone()).map_err(|e| {
            error!(error = %e, payload = %body, "Chain stats response did not parse");
            SdkError::MalformedResponse {
                operation: "chain_stats".to_string(),
                payload: body.to_string(),
            }
        })
    }

    /// Block metadata (`GET /chain/blocks/{id}`). Block ids start at 0.
    pub async fn block_stats(&self, id: u64) -> SdkResult<Value> {
        self.single_shot("block_stats", format!("/chain/blocks/{id}")).await
    }

    /// Transaction lookup by UUID (`GET /transactions/{id}`).
    pub async fn get_transaction(&self, id: &str) -> SdkResult<Value> {
        self.single_shot("get_transaction", segment_path("/transactions", id)).await
    }

    /// Number of invokes not yet resolved or expired.
    pub fn pending_actions(&self) -> usize {
        self.with_monitor(|m| m.pending.len())
    }

    /// Most recent height seen by the monitor (zero until the first change).
    pub fn last_observed_height(&self) -> u64 {
        self.with_monitor(|m| m.last_observed_height)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Snapshot of the chaincode descriptor.
    pub fn descriptor(&self) -> ChaincodeDescriptor {
        self.read_registry(|r| r.descriptor().clone())
    }

    /// Write the descriptor to `dir`; returns the file written.
    pub async fn save(&self, dir: &Path) -> SdkResult<PathBuf> {
        persist::save_descriptor(dir, &self.descriptor()).await
    }

    /// Restore a descriptor written by [`save`](Self::save), binding its
    /// functions and adopting its deployed name.
    pub async fn load_saved(&self, path: &Path) -> SdkResult<ChaincodeDescriptor> {
        let saved = persist::load_descriptor(path).await?;
        Ok(self.write_registry(|registry| {
            registry.restore(saved);
            registry.descriptor().clone()
        }))
    }

    /// Remove the default state directory.
    pub async fn clear(&self) -> SdkResult<()> {
        info!(dir = %self.config().state_dir.display(), "Removing state dir");
        persist::clear_dir(&self.config().state_dir).await
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    pub(crate) async fn send(
        &self,
        target: PeerTarget,
        method: HttpMethod,
        path: String,
        body: Option<Value>,
    ) -> Result<TransportResponse, TransportFailure> {
        let options = self.network_options();
        if options.quiet {
            debug!(peer = %target, path = %path, method = ?method, "Peer request");
        } else {
            info!(peer = %target, path = %path, method = ?method, "Peer request");
        }
        self.shared
            .transport
            .send(TransportRequest {
                target,
                method,
                path,
                body,
                timeout: Duration::from_millis(options.timeout),
            })
            .await
    }

    /// GET against the selected peer with no retry.
    async fn single_shot(&self, operation: &str, path: String) -> SdkResult<Value> {
        let target = self.read_peers(|p| p.selected_target())?;
        match self.send(target, HttpMethod::Get, path, None).await {
            Ok(response) => {
                debug!(operation, "Request succeeded");
                Ok(response.body)
            }
            Err(failure) => {
                error!(operation, status = failure.status, cause = %failure.cause, "Request failed");
                Err(SdkError::Transport {
                    operation: operation.to_string(),
                    status: failure.status,
                    cause: failure.cause,
                })
            }
        }
    }

    /// `identity` if given, else the selected peer's registered identity.
    pub(crate) fn resolve_identity(&self, identity: Option<&str>) -> Option<String> {
        identity
            .map(str::to_string)
            .or_else(|| self.read_peers(|p| p.selected_identity()))
    }

    pub(crate) fn read_peers<T>(&self, f: impl FnOnce(&PeerDirectory) -> T) -> T {
        f(&self.shared.peers.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub(crate) fn write_peers<T>(&self, f: impl FnOnce(&mut PeerDirectory) -> T) -> T {
        f(&mut self.shared.peers.write().unwrap_or_else(|e| e.into_inner()))
    }

    pub(crate) fn read_registry<T>(&self, f: impl FnOnce(&CapabilityRegistry) -> T) -> T {
        f(&self.shared.registry.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub(crate) fn write_registry<T>(&self, f: impl FnOnce(&mut CapabilityRegistry) -> T) -> T {
        f(&mut self.shared.registry.write().unwrap_or_else(|e| e.into_inner()))
    }

    pub(crate) fn with_monitor<T>(&self, f: impl FnOnce(&mut MonitorState) -> T) -> T {
        f(&mut self.shared.monitor.lock().unwrap_or_else(|e| e.into_inner()))
    }
}
