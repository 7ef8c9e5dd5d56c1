// SPDX-License-Identifier: MIT

//! Snapshot persistence for queue compaction.
//!
//! Snapshots store the materialized queue state at a point in time,
//! identified by the WAL sequence number. Recovery loads the snapshot and
//! replays WAL entries after that sequence. Content is zstd-compressed JSON
//! written atomically, with the previous snapshot rotated to a `.bak`.

use crate::atomic::{atomic_write, rotate_bak_path};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Current snapshot schema version
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 3;

/// Errors that can occur in snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found} (current {current})")]
    UnsupportedVersion { found: u32, current: u32 },
}

/// A snapshot of materialized state at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<S> {
    /// Schema version for migrations
    #[serde(rename = "v")]
    pub version: u32,
    /// WAL sequence number at the time of snapshot
    pub seq: u64,
    /// The materialized state
    pub state: S,
    /// When this snapshot was created, epoch milliseconds
    pub created_at_ms: u64,
}

/// Write a snapshot, rotating any existing one to a backup first.
pub fn save_snapshot<S: Serialize>(path: &Path, snapshot: &Snapshot<S>) -> Result<(), SnapshotError> {
    let json = serde_json::to_vec(snapshot)?;
    let compressed = zstd::encode_all(&json[..], ZSTD_LEVEL)?;
    if path.exists() {
        let _ = fs::rename(path, rotate_bak_path(path));
    }
    atomic_write(path, &compressed)?;
    Ok(())
}

/// Load a snapshot if one exists.
pub fn load_snapshot<S: DeserializeOwned>(path: &Path) -> Result<Option<Snapshot<S>>, SnapshotError> {
    if !path.exists() {
        return Ok(None);
    }
    let compressed = fs::read(path)?;
    let json = zstd::decode_all(&compressed[..])?;
    let snapshot: Snapshot<S> = serde_json::from_slice(&json)?;
    if snapshot.version > CURRENT_SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: snapshot.version,
            current: CURRENT_SNAPSHOT_VERSION,
        });
    }
    Ok(Some(snapshot))
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
