//! Capability registry. Maps declared chaincode function names to invoke
//! and query dispatch.
//!
//! Every bound name shares one envelope format and one identity rule: an
//! explicit identity wins, else the selected peer's registered identity,
//! else the call goes out without one and the peer decides.

use crate::client::ChaincodeClient;
use crate::transport::HttpMethod;
use chaincode_types::chaincode::{ChaincodeDescriptor, SavedChaincode};
use chaincode_types::config::ChaincodeOptions;
use chaincode_types::envelope::{ChaincodeId, RpcEnvelope, RpcMethod};
use chaincode_types::error::{SdkError, SdkResult};
use chrono::Utc;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Path all chaincode RPCs are posted to.
pub const CHAINCODE_PATH: &str = "/chaincode";

/// Which kind of callable a name is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// State-changing.
    Invoke,
    /// Read-only.
    Query,
}

/// The chaincode declaration and its bound function names.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    descriptor: ChaincodeDescriptor,
}

impl CapabilityRegistry {
    /// Registry over an existing descriptor.
    pub fn from_descriptor(descriptor: ChaincodeDescriptor) -> Self {
        Self { descriptor }
    }

    /// Apply a chaincode declaration: deployed name, source, version, and
    /// function names. Already bound names are skipped.
    pub fn declare(&mut self, options: &ChaincodeOptions) {
        if let Some(name) = options.deployed_name.as_deref().filter(|n| !n.is_empty()) {
            self.descriptor.deployed_name = name.to_string();
        }
        self.descriptor.source_locator = options.git_url.clone();
        if let Some(version) = &options.version {
            self.descriptor.version = version.clone();
        }
        for name in &options.invoke {
            self.bind(FunctionKind::Invoke, name);
        }
        for name in &options.query {
            self.bind(FunctionKind::Query, name);
        }
        self.descriptor.created_at = Utc::now();
    }

    /// Replace the descriptor with a persisted one.
    pub fn restore(&mut self, saved: SavedChaincode) {
        let mut details = saved.details;
        let invoke = std::mem::take(&mut details.invoke_names);
        let query = std::mem::take(&mut details.query_names);
        self.descriptor = details;
        for name in &invoke {
            self.bind(FunctionKind::Invoke, name);
        }
        for name in &query {
            self.bind(FunctionKind::Query, name);
        }
    }

    /// Bind `name`. Returns `false` if it was already bound.
    pub fn bind(&mut self, kind: FunctionKind, name: &str) -> bool {
        let names = match kind {
            FunctionKind::Invoke => &mut self.descriptor.invoke_names,
            FunctionKind::Query => &mut self.descriptor.query_names,
        };
        if names.iter().any(|n| n == name) {
            debug!(function = name, ?kind, "Skip, function already exists");
            return false;
        }
        info!(function = name, ?kind, "Found chaincode function");
        names.push(name.to_string());
        true
    }

    /// Whether `name` is bound as `kind`.
    pub fn is_bound(&self, kind: FunctionKind, name: &str) -> bool {
        let names = match kind {
            FunctionKind::Invoke => &self.descriptor.invoke_names,
            FunctionKind::Query => &self.descriptor.query_names,
        };
        names.iter().any(|n| n == name)
    }

    /// Record the name the peer assigned on deploy.
    pub fn set_deployed_name(&mut self, name: &str) {
        self.descriptor.deployed_name = name.to_string();
    }

    /// The descriptor.
    pub fn descriptor(&self) -> &ChaincodeDescriptor {
        &self.descriptor
    }
}

/// Success value of a query: `result.message`, else `OK`.
pub fn normalize_query_response(payload: &Value) -> Option<Value> {
    let present = |v: &&Value| !v.is_null();
    payload
        .get("result")
        .and_then(|r| r.get("message"))
        .filter(present)
        .or_else(|| payload.get("OK").filter(present))
        .cloned()
}

impl ChaincodeClient {
    /// Bind an invoke function name. Returns `false` if already bound.
    pub fn bind_invoke(&self, name: &str) -> bool {
        self.write_registry(|r| r.bind(FunctionKind::Invoke, name))
    }

    /// Bind a query function name. Returns `false` if already bound.
    pub fn bind_query(&self, name: &str) -> bool {
        self.write_registry(|r| r.bind(FunctionKind::Query, name))
    }

    /// Callable for a bound invoke function.
    pub fn invoke_fn(&self, name: &str) -> Option<InvokeStub> {
        self.read_registry(|r| r.is_bound(FunctionKind::Invoke, name))
            .then(|| InvokeStub {
                client: self.clone(),
                name: name.to_string(),
            })
    }

    /// Callable for a bound query function.
    pub fn query_fn(&self, name: &str) -> Option<QueryStub> {
        self.read_registry(|r| r.is_bound(FunctionKind::Query, name))
            .then(|| QueryStub {
                client: self.clone(),
                name: name.to_string(),
            })
    }

    /// Call a state-changing chaincode function on the selected peer.
    ///
    /// On success the call is recorded as an unresolved action for the
    /// height monitor and the raw response payload is returned. No retry.
    pub async fn invoke(
        &self,
        function: &str,
        args: Vec<String>,
        identity: Option<&str>,
    ) -> SdkResult<Value> {
        let envelope = self.chaincode_envelope(RpcMethod::Invoke, function, args, identity)?;
        let target = self.read_peers(|p| p.selected_target())?;
        let body = serde_json::to_value(&envelope)?;

        match self
            .send(target, HttpMethod::Post, CHAINCODE_PATH.to_string(), Some(body))
            .await
        {
            Ok(response) => {
                self.with_monitor(|m| m.pending.push(Instant::now()));
                Ok(response.body)
            }
            Err(failure) => {
                error!(function, status = failure.status, cause = %failure.cause, "Invoke failed");
                Err(SdkError::InvokeFailed {
                    function: function.to_string(),
                    status: failure.status,
                    cause: failure.cause,
                })
            }
        }
    }

    /// Call a read-only chaincode function on the selected peer.
    ///
    /// Returns `result.message` from the response, else its `OK` field.
    pub async fn query(
        &self,
        function: &str,
        args: Vec<String>,
        identity: Option<&str>,
    ) -> SdkResult<Value> {
        let envelope = self.chaincode_envelope(RpcMethod::Query, function, args, identity)?;
        let target = self.read_peers(|p| p.selected_target())?;
        let body = serde_json::to_value(&envelope)?;

        match self
            .send(target, HttpMethod::Post, CHAINCODE_PATH.to_string(), Some(body))
            .await
        {
            Ok(response) => normalize_query_response(&response.body).ok_or_else(|| {
                error!(function, payload = %response.body, "Query response has no result");
                SdkError::MalformedResponse {
                    operation: "query".to_string(),
                    payload: response.body.to_string(),
                }
            }),
            Err(failure) => {
                error!(function, status = failure.status, cause = %failure.cause, "Query failed");
                Err(SdkError::QueryFailed {
                    function: function.to_string(),
                    status: failure.status,
                    cause: failure.cause,
                })
            }
        }
    }

    fn chaincode_envelope(
        &self,
        method: RpcMethod,
        function: &str,
        args: Vec<String>,
        identity: Option<&str>,
    ) -> SdkResult<RpcEnvelope> {
        let kind = match method {
            RpcMethod::Query => FunctionKind::Query,
            _ => FunctionKind::Invoke,
        };
        let deployed_name = self.read_registry(|r| {
            r.is_bound(kind, function)
                .then(|| r.descriptor().deployed_name.clone())
        });
        let Some(deployed_name) = deployed_name else {
            return Err(SdkError::UnknownFunction(function.to_string()));
        };

        Ok(RpcEnvelope::new(
            method,
            ChaincodeId::Name(deployed_name),
            function,
            args,
            self.resolve_identity(identity),
            self.shared.request_ids.next_id(),
        ))
    }
}

/// A bound invoke function.
#[derive(Clone)]
pub struct InvokeStub {
    client: ChaincodeClient,
    name: String,
}

impl InvokeStub {
    /// Function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke with `args`, optionally as `identity`.
    pub async fn call(&self, args: Vec<String>, identity: Option<&str>) -> SdkResult<Value> {
        self.client.invoke(&self.name, args, identity).await
    }
}

/// A bound query function.
#[derive(Clone)]
pub struct QueryStub {
    client: ChaincodeClient,
    name: String,
}

impl QueryStub {
    /// Function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Query with `args`, optionally as `identity`.
    pub async fn call(&self, args: Vec<String>, identity: Option<&str>) -> SdkResult<Value> {
        self.client.query(&self.name, args, identity).await
    }
}
