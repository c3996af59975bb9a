//! Atomic JSON snapshots of the in-memory store (temp file + rename)

use super::memory::StoreState;
use super::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub state: StoreState,
}

impl StoreSnapshot {
    pub const CURRENT_VERSION: u32 = 1;
}

pub async fn save_snapshot(state: StoreState, path: &Path) -> Result<(), StoreError> {
    let snapshot = StoreSnapshot {
        version: StoreSnapshot::CURRENT_VERSION,
        saved_at: Utc::now(),
        state,
    };
    let json = serde_json::to_string_pretty(&snapshot)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, &json).await?;
    tokio::fs::rename(&temp_path, path).await?;

    tracing::debug!(
        travels = snapshot.state.travels.len(),
        rescues = snapshot.state.rescues.len(),
        path = %path.display(),
        "Store snapshot saved"
    );
    Ok(())
}

/// Load a snapshot, or `None` if the file does not exist yet
pub async fn load_snapshot(path: &Path) -> Result<Option<StoreState>, StoreError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        tracing::info!(path = %path.display(), "No store snapshot found, starting fresh");
        return Ok(None);
    }

    let json = tokio::fs::read_to_string(path).await?;
    let snapshot: StoreSnapshot = serde_json::from_str(&json)?;

    if snapshot.version > StoreSnapshot::CURRENT_VERSION {
        tracing::warn!(
            version = snapshot.version,
            supported = StoreSnapshot::CURRENT_VERSION,
            "Store snapshot is newer than supported"
        );
    }

    tracing::info!(
        travels = snapshot.state.travels.len(),
        saved_at = %snapshot.saved_at,
        "Store snapshot restored"
    );
    Ok(Some(snapshot.state))
}
