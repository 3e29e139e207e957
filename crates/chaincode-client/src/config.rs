//! Client configuration and loading of network/chaincode options from disk.
//!
//! Options files may be TOML or JSON; the extension decides (`.json` is
//! parsed as JSON, anything else as TOML).

use crate::monitor::MonitorConfig;
use chaincode_types::config::LoadOptions;
use chaincode_types::error::{SdkError, SdkResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Delay between registration attempts; a peer may still be starting.
pub const DEFAULT_REGISTRATION_BACKOFF: Duration = Duration::from_secs(30);

/// Settling delay after a successful deploy.
pub const DEFAULT_DEPLOY_DELAY: Duration = Duration::from_millis(500);

/// Directory name under the local data dir for persisted chaincode state.
const STATE_DIR_NAME: &str = "chaincode-client";

/// Client-side settings that are not part of the network description.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Where deploy persists the chaincode descriptor.
    pub state_dir: PathBuf,
    /// Block height monitor cadences.
    pub monitor: MonitorConfig,
    /// Fixed delay between registration attempts.
    pub registration_backoff: Duration,
    /// Settling delay after deploy unless the call overrides it.
    pub deploy_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            monitor: MonitorConfig::default(),
            registration_backoff: DEFAULT_REGISTRATION_BACKOFF,
            deploy_delay: DEFAULT_DEPLOY_DELAY,
        }
    }
}

/// `<local data dir>/chaincode-client`, or the OS temp dir if unknown.
pub fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(STATE_DIR_NAME)
}

/// Read [`LoadOptions`] from a TOML or JSON file.
pub fn load_options(path: &Path) -> SdkResult<LoadOptions> {
    let contents = std::fs::read_to_string(path).map_err(|e| SdkError::Persist {
        path: path.display().to_string(),
        source: e,
    })?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let options = if is_json {
        parse_options_json(&contents)?
    } else {
        parse_options_toml(&contents)?
    };

    info!(path = %path.display(), "Loaded network options");
    Ok(options)
}

/// Parse [`LoadOptions`] from TOML text.
pub fn parse_options_toml(contents: &str) -> SdkResult<LoadOptions> {
    toml::from_str(contents).map_err(|e| SdkError::Serialization(e.to_string()))
}

/// Parse [`LoadOptions`] from JSON text.
pub fn parse_options_json(contents: &str) -> SdkResult<LoadOptions> {
    Ok(serde_json::from_str(contents)?)
}
