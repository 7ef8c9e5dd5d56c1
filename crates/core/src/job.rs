// SPDX-License-Identifier: MIT

//! Sync job model.
//!
//! A [`SyncJob`] is one unit of work: push the metadata of one upstream scene
//! to the downstream media server. Jobs are produced by the event hook and
//! consumed by the sync worker through the persistent queue.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

crate::define_id! {
    /// Unique identifier for one queued job instance.
    pub struct JobId("job-");
}

/// Opaque upstream scene identifier.
///
/// Upstream systems emit either string or integer ids; both deserialize into
/// the string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SceneId(String);

impl SceneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SceneId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SceneId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for SceneId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for SceneId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => SceneId(s),
            Raw::Number(n) => SceneId(n.to_string()),
        })
    }
}

/// What changed upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// Metadata fields changed on an existing scene.
    Metadata,
    /// Scene newly created upstream.
    Create,
    /// Scene removed upstream.
    Delete,
}

crate::display_tags! {
    UpdateKind {
        Metadata => "metadata",
        Create => "create",
        Delete => "delete",
    }
}

/// Deduplication key: one queued job per (scene, update kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(pub u64);

impl JobKey {
    /// Stable across processes and restarts (unlike `DefaultHasher`).
    pub fn compute(scene_id: &SceneId, kind: UpdateKind) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(scene_id.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(kind.as_str().as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Self(u64::from_be_bytes(bytes))
    }
}

/// One unit of sync work, durable for the life of the queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: JobId,
    pub scene_id: SceneId,
    pub kind: UpdateKind,
    /// Pass-through metadata bag from the upstream event. Opaque to the
    /// queue; interpreted only by the downstream client.
    pub payload: serde_json::Value,
    /// Wall clock at enqueue time, epoch milliseconds.
    pub enqueued_at_ms: u64,
}

impl SyncJob {
    pub fn new(
        scene_id: impl Into<SceneId>,
        kind: UpdateKind,
        payload: serde_json::Value,
        enqueued_at_ms: u64,
    ) -> Self {
        Self { id: JobId::new(), scene_id: scene_id.into(), kind, payload, enqueued_at_ms }
    }

    pub fn job_key(&self) -> JobKey {
        JobKey::compute(&self.scene_id, self.kind)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
