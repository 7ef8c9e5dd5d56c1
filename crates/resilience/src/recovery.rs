// SPDX-License-Identifier: MIT

//! Recovery scheduler: decides when the downstream deserves a probe.
//!
//! While the circuit is OPEN or HALF_OPEN the worker asks `should_check`
//! every idle cycle; the scheduler answers yes only when the adaptive probe
//! interval has elapsed and it could take the cross-process lock. The probe
//! interval backs off on consecutive failures (5s → 10s → 20s → 40s → 60s
//! cap, full jitter) and snaps back to base on the first success.
//!
//! `should_check` / `record_check` form a locked pair: the file lock taken
//! by a truthful `should_check` is held until `record_check` persists the
//! outcome, so concurrent processes cannot double-probe.

use crate::breaker::{BreakerError, BreakerState, CircuitBreaker, Transition};
use msq_core::{full_jitter, Clock, ProbeConfig};
use msq_storage::{atomic_write_json, FileLock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::probe::ProbeOutcome;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Breaker(#[from] BreakerError),
}

/// The durable form in `recovery_state.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryState {
    pub last_check_at_ms: u64,
    pub last_check_healthy: bool,
    pub last_probe_latency_ms: u64,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    /// Total recoveries since install.
    pub recovery_count: u64,
    pub last_recovery_at_ms: u64,
    /// Non-zero only while a drain ramp is active.
    pub recovery_started_at_ms: u64,
    /// Next probe due, epoch ms.
    pub next_check_at_ms: u64,
}

struct SchedInner {
    state: RecoveryState,
    /// Held between a truthful `should_check` and its `record_check`.
    guard: Option<FileLock>,
}

/// Durable probe scheduler.
pub struct RecoveryScheduler<C: Clock> {
    path: PathBuf,
    lock_path: PathBuf,
    cfg: ProbeConfig,
    clock: C,
    /// Deterministic jitter for tests; `None` draws fresh randomness.
    jitter_seed: Option<u64>,
    inner: Mutex<SchedInner>,
}

impl<C: Clock> RecoveryScheduler<C> {
    /// Load persisted state from `path`, or start fresh.
    pub fn load(path: &Path, lock_path: &Path, cfg: ProbeConfig, clock: C) -> Result<Self, RecoveryError> {
        let state = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => RecoveryState::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            lock_path: lock_path.to_path_buf(),
            cfg,
            clock,
            jitter_seed: None,
            inner: Mutex::new(SchedInner { state, guard: None }),
        })
    }

    /// Fix the jitter draw, for deterministic test schedules.
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    /// Whether a probe is due. `true` also means the cross-process lock is
    /// now held and the caller must follow up with [`Self::record_check`].
    pub fn should_check(&self, breaker_state: BreakerState) -> bool {
        if !matches!(breaker_state, BreakerState::Open | BreakerState::HalfOpen) {
            return false;
        }
        let mut inner = self.inner.lock();
        if inner.guard.is_some() {
            // A check is already in progress in this process.
            return false;
        }
        if self.clock.epoch_ms() < inner.state.next_check_at_ms {
            return false;
        }
        match FileLock::try_exclusive(&self.lock_path) {
            Ok(Some(guard)) => {
                inner.guard = Some(guard);
                true
            }
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(error = %err, "probe lock unavailable");
                false
            }
        }
    }

    /// Record a probe outcome, feed HALF_OPEN successes into the breaker,
    /// and schedule the next check. Releases the lock taken by
    /// [`Self::should_check`]. Returns [`Transition::Closed`] when this
    /// probe closed the circuit.
    pub fn record_check(
        &self,
        outcome: ProbeOutcome,
        breaker: &CircuitBreaker<C>,
    ) -> Result<Option<Transition>, RecoveryError> {
        let mut inner = self.inner.lock();
        let now_ms = self.clock.epoch_ms();

        inner.state.last_check_at_ms = now_ms;
        inner.state.last_check_healthy = outcome.healthy;
        inner.state.last_probe_latency_ms = outcome.latency.as_millis() as u64;

        let mut transition = None;
        if outcome.healthy {
            inner.state.consecutive_successes += 1;
            inner.state.consecutive_failures = 0;
            inner.state.next_check_at_ms = self.clock.deadline_ms(self.cfg.base());

            if breaker.state()? == BreakerState::HalfOpen {
                if let Some(Transition::Closed) = breaker.record_success()? {
                    inner.state.recovery_count += 1;
                    inner.state.last_recovery_at_ms = now_ms;
                    inner.state.recovery_started_at_ms = now_ms;
                    transition = Some(Transition::Closed);
                    tracing::info!(
                        recovery_count = inner.state.recovery_count,
                        "downstream recovered via probe"
                    );
                }
            }
        } else {
            inner.state.consecutive_failures += 1;
            inner.state.consecutive_successes = 0;
            let delay = full_jitter(
                inner.state.consecutive_failures.saturating_sub(1),
                self.cfg.base(),
                self.cfg.cap(),
                self.jitter_seed,
            );
            inner.state.next_check_at_ms = self.clock.deadline_ms(delay);
            tracing::debug!(
                consecutive_failures = inner.state.consecutive_failures,
                next_in_ms = delay.as_millis() as u64,
                "probe failed, backing off"
            );
        }

        self.persist(&inner.state)?;
        inner.guard = None;
        Ok(transition)
    }

    /// Stamp a recovery observed by the worker (a real job succeeded and
    /// closed the circuit, without a probe in between).
    pub fn mark_recovered(&self) -> Result<(), RecoveryError> {
        let mut inner = self.inner.lock();
        let now_ms = self.clock.epoch_ms();
        inner.state.recovery_count += 1;
        inner.state.last_recovery_at_ms = now_ms;
        inner.state.recovery_started_at_ms = now_ms;
        self.persist(&inner.state)
    }

    /// The drain ramp has run its course; forget the recovery period.
    pub fn clear_recovery_period(&self) -> Result<(), RecoveryError> {
        let mut inner = self.inner.lock();
        if inner.state.recovery_started_at_ms == 0 {
            return Ok(());
        }
        inner.state.recovery_started_at_ms = 0;
        self.persist(&inner.state)
    }

    /// Point-in-time copy of the durable state.
    pub fn state(&self) -> RecoveryState {
        self.inner.lock().state.clone()
    }

    fn persist(&self, state: &RecoveryState) -> Result<(), RecoveryError> {
        atomic_write_json(&self.path, state)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
