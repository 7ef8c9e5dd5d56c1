// SPDX-License-Identifier: MIT

use super::*;
use async_trait::async_trait;
use msq_core::{FakeClock, SyncError, SyncJob};

struct ScriptedServer {
    result: Result<(), SyncError>,
    delay: Option<Duration>,
}

#[async_trait]
impl MediaServer for ScriptedServer {
    async fn sync_scene(&self, _job: &SyncJob) -> Result<(), SyncError> {
        Ok(())
    }

    async fn health_probe(&self) -> Result<(), SyncError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

#[tokio::test]
async fn healthy_server_reports_healthy() {
    let clock = FakeClock::new();
    let server = ScriptedServer { result: Ok(()), delay: None };

    let outcome = check(&server, Duration::from_secs(5), &clock).await;
    assert!(outcome.healthy);
}

#[tokio::test]
async fn failing_data_path_reports_unhealthy() {
    let clock = FakeClock::new();
    let server = ScriptedServer {
        result: Err(SyncError::DownstreamDown("warming caches".into())),
        delay: None,
    };

    let outcome = check(&server, Duration::from_secs(5), &clock).await;
    assert!(!outcome.healthy);
}

#[tokio::test(start_paused = true)]
async fn slow_probe_times_out_as_unhealthy() {
    let clock = FakeClock::new();
    let server = ScriptedServer { result: Ok(()), delay: Some(Duration::from_secs(30)) };

    let outcome = check(&server, Duration::from_secs(5), &clock).await;
    assert!(!outcome.healthy);
    assert_eq!(outcome.latency, Duration::from_secs(5));
}
