//! Persisted chaincode state: `{"details": <descriptor>}` as JSON.

use chaincode_types::chaincode::{ChaincodeDescriptor, SavedChaincode};
use chaincode_types::error::{SdkError, SdkResult};
use std::path::{Path, PathBuf};
use tracing::{error, info};

fn persist_error(path: &Path, source: std::io::Error) -> SdkError {
    SdkError::Persist {
        path: path.display().to_string(),
        source,
    }
}

/// Write `descriptor` into `dir` (created if missing) as
/// `<deployedName>.json`, or `chaincode.json` if undeployed.
pub async fn save_descriptor(dir: &Path, descriptor: &ChaincodeDescriptor) -> SdkResult<PathBuf> {
    let dest = dir.join(descriptor.file_name());
    let json = serde_json::to_vec(&SavedChaincode {
        details: descriptor.clone(),
    })?;

    let written: std::io::Result<()> = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&dest, json).await
    }
    .await;

    if let Err(e) = written {
        error!(path = %dest.display(), error = %e, "save() fs write error");
        return Err(persist_error(&dest, e));
    }

    info!(path = %dest.display(), "Saved chaincode details");
    Ok(dest)
}

/// Read a descriptor written by [`save_descriptor`].
pub async fn load_descriptor(path: &Path) -> SdkResult<SavedChaincode> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| persist_error(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Remove `dir` and everything in it. A missing directory is not an error.
pub async fn clear_dir(dir: &Path) -> SdkResult<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(persist_error(dir, e)),
    }
}
