// SPDX-License-Identifier: MIT

//! Event hook: the upstream-facing enqueue path.
//!
//! Called from the upstream system's change notifications. The contract is
//! strict: return fast (the queue append is one fsynced write) and never
//! propagate an error back into the caller. A broken disk must not take
//! the upstream process down with it.

use msq_core::{Clock, SceneId, SyncJob, UpdateKind};
use msq_storage::{Enqueued, SyncQueue};
use parking_lot::Mutex;
use std::sync::Arc;

/// Upstream-facing handle to the persistent queue.
pub struct SyncHook<C: Clock> {
    queue: Arc<Mutex<SyncQueue<C>>>,
    clock: C,
}

impl<C: Clock> SyncHook<C> {
    pub fn new(queue: Arc<Mutex<SyncQueue<C>>>, clock: C) -> Self {
        Self { queue, clock }
    }

    /// Capture one upstream change event. Errors are logged, never raised.
    pub fn on_update(
        &self,
        scene_id: impl Into<SceneId>,
        kind: UpdateKind,
        payload: serde_json::Value,
    ) {
        let job = SyncJob::new(scene_id, kind, payload, self.clock.epoch_ms());
        let scene_id = job.scene_id.clone();
        match self.queue.lock().enqueue(job) {
            Ok(Enqueued::Added(id)) => {
                tracing::debug!(job_id = %id, scene_id = %scene_id, kind = %kind, "update captured");
            }
            Ok(Enqueued::Duplicate(id)) => {
                tracing::debug!(job_id = %id, scene_id = %scene_id, "update already queued");
            }
            Err(err) => {
                tracing::error!(scene_id = %scene_id, error = %err, "failed to capture update");
            }
        }
    }
}

#[cfg(test)]
#[path = "hook_tests.rs"]
mod tests;
