// SPDX-License-Identifier: MIT

//! Dead-letter recovery pipeline.
//!
//! Re-enqueues jobs that failed during an outage window, behind three
//! idempotent gates: downstream health, already-queued dedup, and upstream
//! existence. Running the same window twice enqueues nothing the second
//! time; everything lands in `skipped_already_queued`.

use msq_core::{Clock, ErrorKind, MediaServer, SceneId, SceneIndex, SyncJob};
use msq_resilience::probe;
use msq_storage::{DeadLetterStore, DlqRecord, Enqueued, SyncQueue};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;

/// Which dead-letter kinds may be re-enqueued.
///
/// Auth, permission, and permanent-data failures are denied regardless of
/// what the caller asks for: replaying those can only fail again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    allowed: HashSet<ErrorKind>,
}

impl RecoveryPolicy {
    /// The default safe list: outage casualties only.
    pub fn safe() -> Self {
        Self { allowed: [ErrorKind::DownstreamDown].into() }
    }

    /// Opt-in wider net: transient and not-found failures too.
    pub fn extended() -> Self {
        Self {
            allowed: [ErrorKind::DownstreamDown, ErrorKind::Transient, ErrorKind::NotFound].into(),
        }
    }

    /// Custom kind list; denied kinds are stripped.
    pub fn with_kinds<I: IntoIterator<Item = ErrorKind>>(kinds: I) -> Self {
        Self { allowed: kinds.into_iter().filter(|k| !k.is_recovery_denied()).collect() }
    }

    pub fn allows(&self, kind: ErrorKind) -> bool {
        !kind.is_recovery_denied() && self.allowed.contains(&kind)
    }

    fn kinds(&self) -> HashSet<ErrorKind> {
        self.allowed.iter().copied().filter(|k| !k.is_recovery_denied()).collect()
    }
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self::safe()
    }
}

/// Tally of one recovery run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveryReport {
    pub recovered: usize,
    pub skipped_already_queued: usize,
    pub skipped_downstream_down: usize,
    pub skipped_scene_missing: usize,
    pub failed: usize,
    pub recovered_scene_ids: Vec<SceneId>,
}

/// Re-enqueue eligible dead-letter entries whose `failed_at` lies in
/// `[start_ms, end_ms]` (inclusive).
#[allow(clippy::too_many_arguments)]
pub async fn recover_outage_jobs<C: Clock>(
    start_ms: u64,
    end_ms: u64,
    policy: &RecoveryPolicy,
    queue: &Mutex<SyncQueue<C>>,
    dlq: &Mutex<DeadLetterStore>,
    server: &dyn MediaServer,
    index: &dyn SceneIndex,
    probe_timeout: Duration,
    clock: &C,
) -> RecoveryReport {
    let mut report = RecoveryReport::default();

    let kinds = policy.kinds();
    let entries: Vec<DlqRecord> = {
        let dlq = dlq.lock();
        dlq.entries_in_window(start_ms, end_ms, Some(&kinds)).into_iter().cloned().collect()
    };
    if entries.is_empty() {
        tracing::info!(start_ms, end_ms, "no eligible dead-letter entries in window");
        return report;
    }

    // Gate 1: don't pour jobs at a downstream that is still down.
    let outcome = probe::check(server, probe_timeout, clock).await;
    if !outcome.healthy {
        tracing::warn!(entries = entries.len(), "downstream unhealthy, recovery skipped");
        report.skipped_downstream_down = entries.len();
        return report;
    }

    // Gate 2 setup: one snapshot of queued scenes per run, kept current as
    // this batch enqueues so in-batch duplicates are caught too.
    let mut already_queued = queue.lock().queued_scene_ids();

    for entry in entries {
        if already_queued.contains(&entry.scene_id) {
            report.skipped_already_queued += 1;
            continue;
        }

        // Gate 3: the upstream scene must still exist.
        match index.find_scene(&entry.scene_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::debug!(scene_id = %entry.scene_id, "scene gone upstream, skipped");
                report.skipped_scene_missing += 1;
                continue;
            }
            Err(err) => {
                tracing::warn!(scene_id = %entry.scene_id, error = %err, "scene lookup failed");
                report.failed += 1;
                continue;
            }
        }

        // Fresh job (new id, new enqueue time), original payload.
        let job = SyncJob::new(
            entry.scene_id.clone(),
            entry.job.kind,
            entry.job.payload.clone(),
            clock.epoch_ms(),
        );
        match queue.lock().enqueue(job) {
            Ok(Enqueued::Added(_)) => {
                already_queued.insert(entry.scene_id.clone());
                report.recovered_scene_ids.push(entry.scene_id);
                report.recovered += 1;
            }
            Ok(Enqueued::Duplicate(_)) => {
                report.skipped_already_queued += 1;
            }
            Err(err) => {
                tracing::error!(scene_id = %entry.scene_id, error = %err, "re-enqueue failed");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        recovered = report.recovered,
        skipped_already_queued = report.skipped_already_queued,
        skipped_scene_missing = report.skipped_scene_missing,
        failed = report.failed,
        "dead-letter recovery finished"
    );
    report
}

#[cfg(test)]
#[path = "recover_tests.rs"]
mod tests;
