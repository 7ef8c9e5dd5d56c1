// SPDX-License-Identifier: MIT

//! Trait seams for the external systems the worker talks to.
//!
//! Concrete transports live outside this workspace; the daemon wires
//! implementations in at construction time. Implementations classify every
//! failure into a [`SyncError`](crate::SyncError) variant; the worker
//! dispatches on the variant, never on a catch-all.

use crate::error::SyncError;
use crate::job::{SceneId, SyncJob};
use async_trait::async_trait;

/// Policy a downstream integration declares for not-found sync failures:
/// some servers create library entries lazily (retry until they appear),
/// others never will (dead-letter immediately).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundPolicy {
    /// Eventual creation expected; treat like a transient failure.
    Retry,
    /// Record will never appear; dead-letter on first sight.
    Permanent,
}

/// The downstream media server receiving metadata.
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Push one job's metadata downstream.
    async fn sync_scene(&self, job: &SyncJob) -> Result<(), SyncError>;

    /// Deep health check. Must exercise the server's data path: a server
    /// that has bound its port but is still warming caches must fail here.
    async fn health_probe(&self) -> Result<(), SyncError>;

    /// How this integration wants not-found sync failures handled.
    fn not_found_policy(&self) -> NotFoundPolicy {
        NotFoundPolicy::Permanent
    }
}

/// Minimal view of an upstream scene used by the recovery pipeline.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SceneRecord {
    pub id: SceneId,
    pub title: Option<String>,
}

/// The upstream scene store, queried to confirm a scene still exists before
/// re-enqueueing its dead-lettered job.
#[async_trait]
pub trait SceneIndex: Send + Sync {
    async fn find_scene(&self, id: &SceneId) -> Result<Option<SceneRecord>, SyncError>;
}
