//! Chain statistics reported by `GET /chain`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Chain height and tip hashes, plus whatever else the peer reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStats {
    /// Number of committed blocks. Zero when the peer omitted it.
    #[serde(default)]
    pub height: u64,
    /// Hash of the newest block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_block_hash: Option<String>,
    /// Hash of the block before it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_block_hash: Option<String>,
    /// Every other field of the peer's payload, unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
