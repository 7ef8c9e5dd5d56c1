// SPDX-License-Identifier: MIT

//! The sync worker: drains the queue through the breaker and limiter.
//!
//! One worker task per daemon run. Each iteration walks the gates in order:
//! recovery-period rollover, circuit state, drain limiter, queue pull,
//! dispatch, outcome recording. The worker is the single mutator of breaker
//! and scheduler state; components announce transitions through return
//! values and the worker wires the consequences (outage ledger, drain ramp).
//!
//! Every wait is chunked so a shutdown signal is honored within half a
//! second.

use msq_core::{full_jitter, Clock, ErrorKind, JobId, NotFoundPolicy, SyncConfig, SyncError};
use msq_resilience::{
    probe, BreakerError, BreakerState, CircuitBreaker, DrainLimiter, OutageError, OutageHistory,
    RecoveryError, RecoveryScheduler, Transition,
};
use msq_storage::{DeadLetterStore, DlqError, QueueError, QueuedJob, SyncQueue};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Pause between empty queue polls.
const POLL_IDLE: Duration = Duration::from_millis(250);
/// Pause per idle cycle while the circuit is open.
const OPEN_IDLE: Duration = Duration::from_secs(1);
/// Pause after an iteration error before retrying.
const ERROR_IDLE: Duration = Duration::from_secs(1);
/// Maximum single sleep slice, bounding shutdown latency.
const SLEEP_SLICE: Duration = Duration::from_millis(500);

const SWEEP_INTERVAL_MS: u64 = 86_400_000;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Dlq(#[from] DlqError),
    #[error(transparent)]
    Breaker(#[from] BreakerError),
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
    #[error(transparent)]
    Outage(#[from] OutageError),
}

/// What one worker iteration did. Returned by [`SyncWorker::run_once`] so
/// tests can drive the loop deterministically; [`SyncWorker::run`] uses it
/// to pick the follow-up sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration {
    /// Queue empty (or all jobs still delayed).
    Idle,
    /// Circuit open; ran the bounded idle cycle instead of pulling.
    BreakerOpen,
    /// Limiter demanded a wait before the next dispatch.
    Throttled(Duration),
    /// Job synced and acked.
    Synced(JobId),
    /// Job nacked back onto the queue for retry.
    Retried(JobId),
    /// Job moved to the dead-letter store.
    DeadLettered(JobId),
}

/// The orchestration loop around queue, breaker, limiter, scheduler, and
/// outage ledger. Holds references to all of them, owns none of their state
/// (the limiter excepted, which lives and dies with the worker).
pub struct SyncWorker<C: Clock> {
    queue: Arc<Mutex<SyncQueue<C>>>,
    dlq: Arc<Mutex<DeadLetterStore>>,
    breaker: Arc<CircuitBreaker<C>>,
    scheduler: Arc<RecoveryScheduler<C>>,
    history: Arc<OutageHistory>,
    limiter: DrainLimiter<C>,
    server: Arc<dyn msq_core::MediaServer>,
    cfg: SyncConfig,
    clock: C,
    was_in_recovery: bool,
    last_sweep_ms: u64,
}

impl<C: Clock> SyncWorker<C> {
    /// Wire up a worker. If a recovery ramp was active when the previous
    /// process stopped, the limiter resumes it from the persisted anchor
    /// rather than starting over.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<Mutex<SyncQueue<C>>>,
        dlq: Arc<Mutex<DeadLetterStore>>,
        breaker: Arc<CircuitBreaker<C>>,
        scheduler: Arc<RecoveryScheduler<C>>,
        history: Arc<OutageHistory>,
        server: Arc<dyn msq_core::MediaServer>,
        cfg: SyncConfig,
        clock: C,
    ) -> Self {
        let limiter = DrainLimiter::new(cfg.limiter.clone(), clock.clone());
        let anchor_ms = scheduler.state().recovery_started_at_ms;
        if anchor_ms != 0 {
            limiter.resume_recovery_period(anchor_ms);
        }
        let was_in_recovery = limiter.is_in_recovery();
        Self {
            queue,
            dlq,
            breaker,
            scheduler,
            history,
            limiter,
            server,
            cfg,
            clock,
            was_in_recovery,
            last_sweep_ms: 0,
        }
    }

    /// The drain limiter, for status and tests.
    pub fn limiter(&self) -> &DrainLimiter<C> {
        &self.limiter
    }

    /// Run until `shutdown` fires. Checkpoints the queue on the way out.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("sync worker started");
        while !shutdown.is_cancelled() {
            match self.run_once().await {
                Ok(Iteration::Idle) => sleep_cooperative(POLL_IDLE, &shutdown).await,
                Ok(Iteration::BreakerOpen) => sleep_cooperative(OPEN_IDLE, &shutdown).await,
                Ok(Iteration::Throttled(wait)) => sleep_cooperative(wait, &shutdown).await,
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(error = %err, "worker iteration failed");
                    sleep_cooperative(ERROR_IDLE, &shutdown).await;
                }
            }
        }
        if let Err(err) = self.queue.lock().checkpoint() {
            tracing::warn!(error = %err, "final queue checkpoint failed");
        }
        tracing::info!("sync worker stopped");
    }

    /// One pass through the gates. Does not sleep; the caller paces.
    pub async fn run_once(&mut self) -> Result<Iteration, WorkerError> {
        let now_ms = self.clock.epoch_ms();

        // Opportunistic dead-letter retention sweep, once a day.
        if now_ms.saturating_sub(self.last_sweep_ms) >= SWEEP_INTERVAL_MS {
            self.last_sweep_ms = now_ms;
            if let Err(err) =
                self.dlq.lock().prune_older_than_days(self.cfg.dlq.retention_days, now_ms)
            {
                tracing::warn!(error = %err, "dead-letter retention sweep failed");
            }
        }

        // Gate 1: recovery-period rollover.
        if self.was_in_recovery && !self.limiter.is_in_recovery() {
            self.limiter.end_recovery_period();
            self.scheduler.clear_recovery_period()?;
            self.was_in_recovery = false;
            tracing::info!("drain ramp complete, resuming full rate");
        }

        // Gate 2: circuit state.
        let state = self.breaker.state()?;
        if state != BreakerState::Closed {
            // Probe when due; a healthy probe in HALF_OPEN may close the
            // circuit right here.
            if self.scheduler.should_check(state) {
                let outcome =
                    probe::check(self.server.as_ref(), self.cfg.probe.timeout(), &self.clock).await;
                if let Some(Transition::Closed) =
                    self.scheduler.record_check(outcome, &self.breaker)?
                {
                    self.on_recovered(false)?;
                }
            }
            if self.breaker.state()? == BreakerState::Open {
                return Ok(Iteration::BreakerOpen);
            }
        }

        // Gate 3: drain limiter.
        let wait = self.limiter.should_wait();
        if wait > Duration::ZERO {
            return Ok(Iteration::Throttled(wait));
        }

        // Gate 4: pull.
        let Some(queued) = self.queue.lock().take()? else {
            return Ok(Iteration::Idle);
        };

        // HALF_OPEN admits one call at a time; a second worker loses the
        // slot and puts the job straight back.
        if !self.breaker.allow()? {
            self.queue.lock().nack(queued.job.id, Duration::ZERO)?;
            return Ok(Iteration::Throttled(OPEN_IDLE));
        }

        self.dispatch(queued).await
    }

    async fn dispatch(&mut self, queued: QueuedJob) -> Result<Iteration, WorkerError> {
        let job_id = queued.job.id;
        tracing::debug!(
            job_id = %job_id,
            scene_id = %queued.job.scene_id,
            retry_count = queued.retry_count,
            "dispatching job"
        );

        let result =
            match tokio::time::timeout(self.cfg.daemon.sync_timeout(), self.server.sync_scene(&queued.job))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(SyncError::Transient("sync call timed out".into())),
            };

        match result {
            Ok(()) => {
                self.queue.lock().ack(job_id)?;
                self.limiter.record_result(true);
                if let Some(Transition::Closed) = self.breaker.record_success()? {
                    self.on_recovered(true)?;
                }
                tracing::info!(job_id = %job_id, scene_id = %queued.job.scene_id, "job synced");
                Ok(Iteration::Synced(job_id))
            }
            Err(err) => self.dispatch_failed(queued, err),
        }
    }

    fn dispatch_failed(
        &mut self,
        queued: QueuedJob,
        err: SyncError,
    ) -> Result<Iteration, WorkerError> {
        let job_id = queued.job.id;
        let kind = err.kind();
        tracing::debug!(job_id = %job_id, kind = %kind, error = %err, "job failed");

        match kind {
            ErrorKind::Transient | ErrorKind::DownstreamDown => {
                self.nack_with_backoff(&queued)?;
                self.limiter.record_result(false);
                if let Some(Transition::Opened) = self.breaker.record_failure(kind)? {
                    self.history.record_start(self.clock.epoch_ms())?;
                }
                Ok(Iteration::Retried(job_id))
            }
            ErrorKind::RateLimited => {
                // Downstream asked us to slow down; that is not ill health.
                self.nack_with_backoff(&queued)?;
                self.limiter.record_result(false);
                Ok(Iteration::Retried(job_id))
            }
            ErrorKind::NotFound => match self.server.not_found_policy() {
                NotFoundPolicy::Retry => {
                    self.nack_with_backoff(&queued)?;
                    Ok(Iteration::Retried(job_id))
                }
                NotFoundPolicy::Permanent => self.dead_letter(&queued, &err),
            },
            ErrorKind::Auth | ErrorKind::Permission | ErrorKind::PermanentData => {
                self.dead_letter(&queued, &err)
            }
            ErrorKind::Internal => {
                // Likely our own bug: retry a few times without blaming the
                // downstream, then dead-letter and count one failure.
                if queued.retry_count < self.cfg.queue.internal_retry_cap {
                    tracing::error!(job_id = %job_id, error = %err, "internal dispatch error");
                    self.nack_with_backoff(&queued)?;
                    Ok(Iteration::Retried(job_id))
                } else {
                    tracing::error!(job_id = %job_id, error = %err, "internal retries exhausted");
                    if let Some(Transition::Opened) =
                        self.breaker.record_failure(ErrorKind::Transient)?
                    {
                        self.history.record_start(self.clock.epoch_ms())?;
                    }
                    self.dead_letter(&queued, &err)
                }
            }
        }
    }

    fn nack_with_backoff(&self, queued: &QueuedJob) -> Result<(), WorkerError> {
        let delay = full_jitter(
            queued.retry_count,
            self.cfg.queue.retry_base(),
            self.cfg.queue.retry_cap(),
            None,
        );
        self.queue.lock().nack(queued.job.id, delay)?;
        Ok(())
    }

    fn dead_letter(&self, queued: &QueuedJob, err: &SyncError) -> Result<Iteration, WorkerError> {
        let now_ms = self.clock.epoch_ms();
        self.dlq.lock().add(
            &queued.job,
            err.kind(),
            err.message(),
            err.to_string(),
            queued.retry_count,
            now_ms,
        )?;
        self.queue.lock().fail(queued.job.id)?;
        Ok(Iteration::DeadLettered(queued.job.id))
    }

    /// The circuit just closed. Stamp the recovery (unless the scheduler
    /// already did, for probe-driven closes), start the drain ramp, and
    /// close the outage window with its affected-jobs count.
    fn on_recovered(&mut self, stamp_scheduler: bool) -> Result<(), WorkerError> {
        let now_ms = self.clock.epoch_ms();
        if stamp_scheduler {
            self.scheduler.mark_recovered()?;
        }
        self.limiter.start_recovery_period();
        self.was_in_recovery = true;

        let jobs_affected = self
            .history
            .open_started_at_ms()
            .map(|start_ms| self.dlq.lock().count_in_window(start_ms, now_ms) as u64)
            .unwrap_or(0);
        self.history.record_end(now_ms, jobs_affected)?;
        Ok(())
    }
}

/// Sleep `total`, slicing so `shutdown` is honored within [`SLEEP_SLICE`].
pub async fn sleep_cooperative(total: Duration, shutdown: &CancellationToken) {
    let mut remaining = total;
    while remaining > Duration::ZERO && !shutdown.is_cancelled() {
        let nap = remaining.min(SLEEP_SLICE);
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(nap) => {}
        }
        remaining = remaining.saturating_sub(nap);
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
