// SPDX-License-Identifier: MIT

//! Durable state layout under the data directory.

use std::path::{Path, PathBuf};

/// Locations of everything msqd persists.
///
/// The queue keeps `queue.wal` + `queue.snapshot` at the root; the rest are
/// single JSON files written atomically.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Explicit override, or `$XDG_STATE_HOME/msq` (falling back to the
    /// platform data dir).
    pub fn resolve(explicit: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(root) = explicit {
            return Ok(Self::new(root));
        }
        let base = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or_else(|| anyhow::anyhow!("cannot determine a state directory; pass --data-dir"))?;
        Ok(Self::new(base.join("msq")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the queue WAL and snapshot.
    pub fn queue_dir(&self) -> &Path {
        &self.root
    }

    pub fn dead_letters(&self) -> PathBuf {
        self.root.join("dlq.jsonl")
    }

    pub fn circuit_breaker(&self) -> PathBuf {
        self.root.join("circuit_breaker.json")
    }

    pub fn recovery_state(&self) -> PathBuf {
        self.root.join("recovery_state.json")
    }

    pub fn recovery_lock(&self) -> PathBuf {
        self.root.join("recovery.lock")
    }

    pub fn outage_history(&self) -> PathBuf {
        self.root.join("outage_history.json")
    }

    /// Singleton guard: one msqd per data directory.
    pub fn daemon_lock(&self) -> PathBuf {
        self.root.join("msqd.lock")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("msq.toml")
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
