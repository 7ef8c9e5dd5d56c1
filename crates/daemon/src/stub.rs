// SPDX-License-Identifier: MIT

//! Placeholder clients wired when no integration is linked in.
//!
//! Every sync and probe fails downstream-down, so a bare msqd still
//! captures events durably and drains the backlog once a real integration
//! replaces these.

use async_trait::async_trait;
use msq_core::{MediaServer, SceneId, SceneIndex, SceneRecord, SyncError, SyncJob};

const MESSAGE: &str = "no media server integration configured";

pub struct UnconfiguredMediaServer;

#[async_trait]
impl MediaServer for UnconfiguredMediaServer {
    async fn sync_scene(&self, _job: &SyncJob) -> Result<(), SyncError> {
        Err(SyncError::DownstreamDown(MESSAGE.into()))
    }

    async fn health_probe(&self) -> Result<(), SyncError> {
        Err(SyncError::DownstreamDown(MESSAGE.into()))
    }
}

pub struct UnconfiguredSceneIndex;

#[async_trait]
impl SceneIndex for UnconfiguredSceneIndex {
    async fn find_scene(&self, _id: &SceneId) -> Result<Option<SceneRecord>, SyncError> {
        Err(SyncError::Internal("no scene index integration configured".into()))
    }
}
