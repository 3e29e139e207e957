//! Chaincode descriptor and its persisted form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// File name used when persisting a descriptor that has not been deployed.
pub const DEFAULT_STATE_FILE: &str = "chaincode.json";

/// What the client knows about the remote chaincode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaincodeDescriptor {
    /// Name assigned by the peer on deploy; empty until deployed or loaded.
    #[serde(default)]
    pub deployed_name: String,
    /// Source locator handed to the peer on deploy.
    #[serde(default)]
    pub source_locator: String,
    /// Chaincode version string.
    #[serde(default)]
    pub version: String,
    /// Declared invoke function names, in declaration order.
    #[serde(default)]
    pub invoke_names: Vec<String>,
    /// Declared query function names, in declaration order.
    #[serde(default)]
    pub query_names: Vec<String>,
    /// When the declaration was loaded.
    pub created_at: DateTime<Utc>,
}

impl ChaincodeDescriptor {
    /// An empty, undeployed descriptor.
    pub fn new(source_locator: impl Into<String>) -> Self {
        Self {
            deployed_name: String::new(),
            source_locator: source_locator.into(),
            version: String::new(),
            invoke_names: Vec::new(),
            query_names: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Whether a deployed name is known.
    pub fn is_deployed(&self) -> bool {
        !self.deployed_name.is_empty()
    }

    /// `<deployedName>.json`, or [`DEFAULT_STATE_FILE`] if undeployed.
    pub fn file_name(&self) -> String {
        if self.is_deployed() {
            format!("{}.json", self.deployed_name)
        } else {
            DEFAULT_STATE_FILE.to_string()
        }
    }
}

/// Whether `name` can be used as a file name inside the state directory:
/// exactly one plain path component, no separators, no `.` or `..`.
pub fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

impl Default for ChaincodeDescriptor {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// On-disk form: `{"details": <descriptor>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedChaincode {
    /// The persisted descriptor.
    pub details: ChaincodeDescriptor,
}
