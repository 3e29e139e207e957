//! JSON-RPC envelope posted to a peer's `/chaincode` endpoint.
//!
//! ```text
//! { "jsonrpc": "2.0", "method": "invoke",
//!   "params": { "type": 1, "chaincodeID": {"name": "..."},
//!               "ctorMsg": {"function": "write", "args": ["a", "1"]},
//!               "secureContext": "user_type1_0" },
//!   "id": 1712345678901 }
//! ```

use serde::{Deserialize, Serialize};

/// Protocol version carried in every envelope.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Chaincode type code for Go chaincode.
pub const CHAINCODE_TYPE_GOLANG: u8 = 1;

/// RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcMethod {
    /// Install chaincode.
    Deploy,
    /// State-changing call.
    Invoke,
    /// Read-only call.
    Query,
}

impl RpcMethod {
    /// Wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Invoke => "invoke",
            Self::Query => "query",
        }
    }
}

impl std::fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which chaincode a request addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChaincodeId {
    /// Source locator, used by deploy.
    Path(String),
    /// Deployed name, used by invoke and query.
    Name(String),
}

/// Function call carried by the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtorMsg {
    /// Chaincode function name.
    pub function: String,
    /// Positional string arguments.
    pub args: Vec<String>,
}

/// Envelope parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcParams {
    /// Chaincode type code.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Target chaincode.
    #[serde(rename = "chaincodeID")]
    pub chaincode_id: ChaincodeId,
    /// Function and arguments.
    pub ctor_msg: CtorMsg,
    /// Identity the call is made on behalf of; omitted when unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_context: Option<String>,
}

/// A complete JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcEnvelope {
    /// Always [`PROTOCOL_VERSION`]; serialized as `jsonrpc`.
    #[serde(rename = "jsonrpc")]
    pub protocol_version: String,
    /// Requested operation.
    pub method: RpcMethod,
    /// Call parameters.
    pub params: RpcParams,
    /// Unique request id, used only for server-side tracing.
    pub id: u64,
}

impl RpcEnvelope {
    /// Build an envelope.
    pub fn new(
        method: RpcMethod,
        chaincode_id: ChaincodeId,
        function: impl Into<String>,
        args: Vec<String>,
        identity: Option<String>,
        request_id: u64,
    ) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            method,
            params: RpcParams {
                kind: CHAINCODE_TYPE_GOLANG,
                chaincode_id,
                ctor_msg: CtorMsg {
                    function: function.into(),
                    args,
                },
                secure_context: identity,
            },
            id: request_id,
        }
    }
}
