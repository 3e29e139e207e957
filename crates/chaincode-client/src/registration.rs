//! Identity registration against a peer's membership service (`/registrar`).
//!
//! Registration retries with a fixed delay, since a freshly started peer
//! may not accept registrations yet. Unregister and check are single-shot.

use crate::client::ChaincodeClient;
use crate::transport::{segment_path, HttpMethod, TransportFailure};
use chaincode_types::error::{SdkError, SdkResult};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info, warn};

/// Registration path.
pub const REGISTRAR_PATH: &str = "/registrar";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Retry budget for one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationPolicy {
    /// Retries after the first attempt.
    pub max_retry: u32,
    /// Fixed delay before each retry.
    pub backoff: Duration,
}

/// Where a registration currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// Attempt `n` (1-based) is due.
    Attempting(u32),
    /// The peer accepted the identity.
    Success,
    /// The retry budget is spent.
    GaveUp,
}

impl RegistrationState {
    /// Initial state.
    pub fn start() -> Self {
        Self::Attempting(1)
    }

    /// Transition after an attempt.
    pub fn next(self, succeeded: bool, max_retry: u32) -> Self {
        match self {
            Self::Attempting(_) if succeeded => Self::Success,
            Self::Attempting(n) if n <= max_retry => Self::Attempting(n + 1),
            Self::Attempting(_) => Self::GaveUp,
            terminal => terminal,
        }
    }
}

// ---------------------------------------------------------------------------
// Client operations
// ---------------------------------------------------------------------------

impl ChaincodeClient {
    /// Register `enroll_id` with the peer at `index`, retrying up to
    /// `max_retry` times (default: the network's `maxRetry`).
    ///
    /// On success the identity is remembered for that peer and used by
    /// later calls that don't name one.
    pub async fn register(
        &self,
        index: usize,
        enroll_id: &str,
        enroll_secret: &str,
        max_retry: Option<u32>,
    ) -> SdkResult<Value> {
        let policy = RegistrationPolicy {
            max_retry: max_retry.unwrap_or_else(|| self.network_options().max_retry),
            backoff: self.config().registration_backoff,
        };
        let (target, peer_name) = self.read_peers(|p| {
            p.target(index)
                .map(|t| (t, p.get(index).map(|e| e.friendly_name.clone())))
        })?;
        let peer_name = peer_name.unwrap_or_default();
        let body = json!({
            "enrollId": enroll_id,
            "enrollSecret": enroll_secret,
        });

        let mut attempt = 1;
        loop {
            info!(peer = %peer_name, enroll_id, attempt, "Registering");

            let failure = match self
                .send(
                    target.clone(),
                    HttpMethod::Post,
                    REGISTRAR_PATH.to_string(),
                    Some(body.clone()),
                )
                .await
            {
                Ok(response) => {
                    info!(enroll_id, attempt, "Registration success");
                    self.write_peers(|p| p.remember_identity(index, enroll_id));
                    return Ok(response.body);
                }
                Err(failure) => failure,
            };

            match RegistrationState::Attempting(attempt).next(false, policy.max_retry) {
                RegistrationState::Attempting(next) => {
                    warn!(
                        enroll_id,
                        attempt,
                        status = failure.status,
                        retry_in_secs = policy.backoff.as_secs(),
                        "Registration failed, retrying"
                    );
                    tokio::time::sleep(policy.backoff).await;
                    attempt = next;
                }
                _ => {
                    let TransportFailure { status, cause } = failure;
                    error!(enroll_id, attempt, status, "Registration failed, giving up");
                    return Err(SdkError::RegistrationFailed {
                        enroll_id: enroll_id.to_string(),
                        attempts: attempt,
                        status,
                        cause,
                    });
                }
            }
        }
    }

    /// Unregister `enroll_id` from the peer at `index`. On success the
    /// identity remembered for that peer is cleared.
    pub async fn unregister(&self, index: usize, enroll_id: &str) -> SdkResult<Value> {
        let target = self.read_peers(|p| p.target(index))?;
        info!(index, enroll_id, "Unregistering");

        match self
            .send(
                target,
                HttpMethod::Delete,
                segment_path(REGISTRAR_PATH, enroll_id),
                None,
            )
            .await
        {
            Ok(response) => {
                info!(enroll_id, "Unregistering success");
                self.write_peers(|p| p.forget_identity(index));
                Ok(response.body)
            }
            Err(failure) => {
                warn!(enroll_id, status = failure.status, "Unregistering failed");
                Err(SdkError::Transport {
                    operation: "unregister".to_string(),
                    status: failure.status,
                    cause: failure.cause,
                })
            }
        }
    }

    /// Ask the peer at `index` whether `enroll_id` is registered.
    /// Never changes remembered identities.
    pub async fn check_registration(&self, index: usize, enroll_id: &str) -> SdkResult<Value> {
        let target = self.read_peers(|p| p.target(index))?;
        info!(index, enroll_id, "Checking registration");

        self.send(
            target,
            HttpMethod::Get,
            segment_path(REGISTRAR_PATH, enroll_id),
            None,
        )
        .await
        .map(|response| response.body)
        .map_err(|failure| {
            error!(enroll_id, status = failure.status, "Check registration failed");
            SdkError::Transport {
                operation: "check_register".to_string(),
                status: failure.status,
                cause: failure.cause,
            }
        })
    }
}

// ===========================================================================
// Tests
// ===========================================================================
