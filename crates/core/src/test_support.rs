// SPDX-License-Identifier: MIT

//! Shared test helpers for other crates' tests.

use crate::job::{SyncJob, UpdateKind};

/// A metadata job for the given scene with an empty payload.
pub fn metadata_job(scene_id: impl Into<crate::SceneId>, enqueued_at_ms: u64) -> SyncJob {
    SyncJob::new(scene_id, UpdateKind::Metadata, serde_json::json!({}), enqueued_at_ms)
}

/// A job with a payload carrying a single `title` field.
pub fn titled_job(scene_id: impl Into<crate::SceneId>, title: &str, enqueued_at_ms: u64) -> SyncJob {
    SyncJob::new(
        scene_id,
        UpdateKind::Metadata,
        serde_json::json!({ "title": title }),
        enqueued_at_ms,
    )
}
