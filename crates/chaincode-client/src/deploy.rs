//! Chaincode deployment.

use crate::capability::CHAINCODE_PATH;
use crate::client::ChaincodeClient;
use crate::persist;
use crate::transport::HttpMethod;
use chaincode_types::chaincode::is_plain_name;
use chaincode_types::envelope::{ChaincodeId, RpcEnvelope, RpcMethod};
use chaincode_types::error::{SdkError, SdkResult};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Per-call deploy settings.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Extra directory to persist the descriptor into, besides the state dir.
    pub save_path: Option<PathBuf>,
    /// Settling delay; defaults to [`ClientConfig::deploy_delay`](crate::ClientConfig).
    pub delay: Option<Duration>,
}

/// Deployed name from a deploy response (`result.message`), if it is a
/// plain name that can be persisted as `<name>.json` in the state dir.
pub fn deployed_name(payload: &Value) -> Option<&str> {
    payload
        .get("result")
        .and_then(|r| r.get("message"))
        .and_then(Value::as_str)
        .filter(|name| is_plain_name(name))
}

impl ChaincodeClient {
    /// Install the declared chaincode on the selected peer, calling its
    /// constructor `function` with `args`.
    ///
    /// Not idempotent: every call is a separate deployment. On success the
    /// peer-assigned name is adopted and persisted, then the call waits out
    /// the settling delay before returning the response payload.
    pub async fn deploy(
        &self,
        function: &str,
        args: Vec<String>,
        options: DeployOptions,
        identity: Option<&str>,
    ) -> SdkResult<Value> {
        let source = self.read_registry(|r| r.descriptor().source_locator.clone());
        let envelope = RpcEnvelope::new(
            RpcMethod::Deploy,
            ChaincodeId::Path(source.clone()),
            function,
            args,
            self.resolve_identity(identity),
            self.shared.request_ids.next_id(),
        );
        let target = self.read_peers(|p| p.selected_target())?;
        let body = serde_json::to_value(&envelope)?;
        info!(source = %source, function, "Deploying chaincode");

        let response = self
            .send(target, HttpMethod::Post, CHAINCODE_PATH.to_string(), Some(body))
            .await
            .map_err(|failure| {
                error!(status = failure.status, cause = %failure.cause, "Deploy failed");
                SdkError::DeployFailed {
                    status: failure.status,
                    cause: failure.cause,
                }
            })?;

        let Some(name) = deployed_name(&response.body) else {
            error!(payload = %response.body, "Deploy response has no usable chaincode name");
            return Err(SdkError::DeployResponseInvalid {
                payload: response.body.to_string(),
            });
        };
        info!(deployed_name = name, "Deploy success");

        let descriptor = self.write_registry(|r| {
            r.set_deployed_name(name);
            r.descriptor().clone()
        });

        let dirs = std::iter::once(self.config().state_dir.clone()).chain(options.save_path);
        for dir in dirs {
            // Persist failures never fail a completed deploy.
            if let Err(e) = persist::save_descriptor(&dir, &descriptor).await {
                warn!(dir = %dir.display(), error = %e, "Could not persist chaincode details");
            }
        }

        tokio::time::sleep(options.delay.unwrap_or(self.config().deploy_delay)).await;
        Ok(response.body)
    }
}
