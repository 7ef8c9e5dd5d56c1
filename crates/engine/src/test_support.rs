// SPDX-License-Identifier: MIT

//! Scripted fake clients for worker and recovery tests.

use async_trait::async_trait;
use msq_core::{MediaServer, NotFoundPolicy, SceneId, SceneIndex, SceneRecord, SyncError, SyncJob};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};

/// A downstream media server with scripted sync outcomes.
///
/// `push_result` queues outcomes consumed in order; once the script runs
/// dry, `default` applies. Health mirrors a flag, independent of the script.
pub struct FakeMediaServer {
    script: Mutex<VecDeque<Result<(), SyncError>>>,
    default: Mutex<Result<(), SyncError>>,
    healthy: Mutex<bool>,
    not_found_policy: Mutex<NotFoundPolicy>,
    synced: Mutex<Vec<SceneId>>,
}

impl FakeMediaServer {
    /// Healthy server that accepts every sync.
    pub fn healthy() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(Ok(())),
            healthy: Mutex::new(true),
            not_found_policy: Mutex::new(NotFoundPolicy::Permanent),
            synced: Mutex::new(Vec::new()),
        }
    }

    /// Queue one scripted sync outcome.
    pub fn push_result(&self, result: Result<(), SyncError>) {
        self.script.lock().push_back(result);
    }

    /// Outcome applied once the script is exhausted.
    pub fn set_default(&self, result: Result<(), SyncError>) {
        *self.default.lock() = result;
    }

    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock() = healthy;
    }

    pub fn set_not_found_policy(&self, policy: NotFoundPolicy) {
        *self.not_found_policy.lock() = policy;
    }

    /// Scenes successfully synced, in order.
    pub fn synced(&self) -> Vec<SceneId> {
        self.synced.lock().clone()
    }
}

#[async_trait]
impl MediaServer for FakeMediaServer {
    async fn sync_scene(&self, job: &SyncJob) -> Result<(), SyncError> {
        let result = self.script.lock().pop_front().unwrap_or_else(|| self.default.lock().clone());
        if result.is_ok() {
            self.synced.lock().push(job.scene_id.clone());
        }
        result
    }

    async fn health_probe(&self) -> Result<(), SyncError> {
        if *self.healthy.lock() {
            Ok(())
        } else {
            Err(SyncError::DownstreamDown("probe refused".into()))
        }
    }

    fn not_found_policy(&self) -> NotFoundPolicy {
        *self.not_found_policy.lock()
    }
}

/// An upstream scene index backed by a set of known ids.
pub struct FakeSceneIndex {
    existing: Mutex<HashSet<SceneId>>,
}

impl FakeSceneIndex {
    pub fn with_scenes<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SceneId>,
    {
        Self { existing: Mutex::new(ids.into_iter().map(Into::into).collect()) }
    }

    pub fn insert(&self, id: impl Into<SceneId>) {
        self.existing.lock().insert(id.into());
    }

    pub fn remove(&self, id: &SceneId) {
        self.existing.lock().remove(id);
    }
}

#[async_trait]
impl SceneIndex for FakeSceneIndex {
    async fn find_scene(&self, id: &SceneId) -> Result<Option<SceneRecord>, SyncError> {
        Ok(self
            .existing
            .lock()
            .contains(id)
            .then(|| SceneRecord { id: id.clone(), title: None }))
    }
}
