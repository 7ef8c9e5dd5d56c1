// SPDX-License-Identifier: MIT

//! Graduated drain limiter.
//!
//! After a recovery the queue may hold hundreds of ready jobs; draining them
//! at full speed reliably re-crashes the just-recovered downstream. Three
//! composed mechanisms prevent that:
//!
//! 1. a linear ramp from `initial_rate` to `target_rate` over `ramp_secs`,
//! 2. a token bucket of capacity 1.0 refilled at the ramped rate,
//! 3. an error-adaptive multiplier: above 30% failures in the sliding
//!    window the rate halves for a backoff period, restored once the error
//!    rate falls under 10%.
//!
//! Entirely in-memory: the ramp anchor (`recovery_started_at`) is persisted
//! by the recovery scheduler and handed back in after a restart.

use msq_core::{Clock, LimiterConfig};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

const CAPACITY: f64 = 1.0;
const BACKOFF_MULTIPLIER: f64 = 0.5;
/// Error rate below which a spent backoff restores the full rate.
const RESTORE_THRESHOLD: f64 = 0.10;
/// Minimum window occupancy before the error rate is trusted; one early
/// failure must not halve the rate on its own.
const MIN_WINDOW_RESULTS: usize = 5;

struct LimiterInner {
    /// Epoch ms; zero while no recovery period is active.
    recovery_started_at_ms: u64,
    tokens: f64,
    last_refill_ms: u64,
    rate_multiplier: f64,
    backoff_until_ms: u64,
    /// Sliding (timestamp, success) window.
    window: VecDeque<(u64, bool)>,
}

/// Rate limiter gating queue drain after a recovery. Owned by the worker.
pub struct DrainLimiter<C: Clock> {
    cfg: LimiterConfig,
    clock: C,
    inner: Mutex<LimiterInner>,
}

impl<C: Clock> DrainLimiter<C> {
    pub fn new(cfg: LimiterConfig, clock: C) -> Self {
        Self {
            cfg,
            clock,
            inner: Mutex::new(LimiterInner {
                recovery_started_at_ms: 0,
                tokens: CAPACITY,
                last_refill_ms: 0,
                rate_multiplier: 1.0,
                backoff_until_ms: 0,
                window: VecDeque::new(),
            }),
        }
    }

    /// Begin a recovery period now. Idempotent while a ramp is active.
    pub fn start_recovery_period(&self) {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        if inner.recovery_started_at_ms != 0 && self.in_recovery_at(&inner, now_ms) {
            return;
        }
        self.reset_to_anchor(&mut inner, now_ms, now_ms);
        tracing::info!(ramp_secs = self.cfg.ramp_secs, "drain ramp started");
    }

    /// Resume a ramp whose anchor survived a restart.
    pub fn resume_recovery_period(&self, started_at_ms: u64) {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        self.reset_to_anchor(&mut inner, started_at_ms, now_ms);
        tracing::info!(
            elapsed_ms = now_ms.saturating_sub(started_at_ms),
            "drain ramp resumed from persisted anchor"
        );
    }

    /// Forget the recovery period and return to unlimited drain.
    pub fn end_recovery_period(&self) {
        let mut inner = self.inner.lock();
        inner.recovery_started_at_ms = 0;
        inner.tokens = CAPACITY;
        inner.rate_multiplier = 1.0;
        inner.backoff_until_ms = 0;
        inner.window.clear();
    }

    /// True while the ramp is running. Exactly at the ramp boundary the
    /// period is over.
    pub fn is_in_recovery(&self) -> bool {
        let inner = self.inner.lock();
        self.in_recovery_at(&inner, self.clock.epoch_ms())
    }

    /// Effective permitted rate (jobs/sec) right now, multiplier included.
    pub fn current_rate(&self) -> f64 {
        let inner = self.inner.lock();
        self.rate_at(&inner, self.clock.epoch_ms())
    }

    pub fn rate_multiplier(&self) -> f64 {
        self.inner.lock().rate_multiplier
    }

    /// How long the caller must wait before dispatching the next job.
    /// Zero outside a recovery period, and zero whenever a token is
    /// available.
    pub fn should_wait(&self) -> Duration {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        if !self.in_recovery_at(&inner, now_ms) {
            return Duration::ZERO;
        }
        self.maybe_restore(&mut inner, now_ms);

        let rate = self.rate_at(&inner, now_ms);
        if rate <= f64::EPSILON {
            return Duration::from_millis(500);
        }

        // Refill at the current effective rate
        let elapsed_secs = now_ms.saturating_sub(inner.last_refill_ms) as f64 / 1000.0;
        inner.tokens = (inner.tokens + elapsed_secs * rate).min(CAPACITY);
        inner.last_refill_ms = now_ms;

        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - inner.tokens) / rate)
        }
    }

    /// Feed a job outcome into the sliding window and adapt the multiplier.
    /// Outside a recovery period only the window is maintained.
    pub fn record_result(&self, success: bool) {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        inner.window.push_back((now_ms, success));
        self.prune_window(&mut inner, now_ms);

        if !self.in_recovery_at(&inner, now_ms) {
            return;
        }

        let rate = self.error_rate(&inner);
        if now_ms < inner.backoff_until_ms {
            return;
        }
        if inner.rate_multiplier < 1.0 {
            self.maybe_restore(&mut inner, now_ms);
            return;
        }
        if rate > self.cfg.error_threshold && inner.window.len() >= MIN_WINDOW_RESULTS {
            inner.rate_multiplier = BACKOFF_MULTIPLIER;
            inner.backoff_until_ms = now_ms + self.window_ms();
            tracing::warn!(
                error_rate = format!("{rate:.2}"),
                "error spike during drain, halving rate"
            );
        }
    }

    pub fn recovery_started_at_ms(&self) -> u64 {
        self.inner.lock().recovery_started_at_ms
    }

    fn reset_to_anchor(&self, inner: &mut LimiterInner, anchor_ms: u64, now_ms: u64) {
        inner.recovery_started_at_ms = anchor_ms;
        inner.tokens = CAPACITY;
        inner.last_refill_ms = now_ms;
        inner.rate_multiplier = 1.0;
        inner.backoff_until_ms = 0;
        inner.window.clear();
    }

    fn in_recovery_at(&self, inner: &LimiterInner, now_ms: u64) -> bool {
        if inner.recovery_started_at_ms == 0 {
            return false;
        }
        let ramp_ms = (self.cfg.ramp_secs * 1000.0) as u64;
        now_ms.saturating_sub(inner.recovery_started_at_ms) < ramp_ms
    }

    fn rate_at(&self, inner: &LimiterInner, now_ms: u64) -> f64 {
        if inner.recovery_started_at_ms == 0 {
            return self.cfg.target_rate;
        }
        let elapsed_secs = now_ms.saturating_sub(inner.recovery_started_at_ms) as f64 / 1000.0;
        let progress = (elapsed_secs / self.cfg.ramp_secs).min(1.0);
        let base = self.cfg.initial_rate + (self.cfg.target_rate - self.cfg.initial_rate) * progress;
        base * inner.rate_multiplier
    }

    fn error_rate(&self, inner: &LimiterInner) -> f64 {
        if inner.window.is_empty() {
            return 0.0;
        }
        let failures = inner.window.iter().filter(|entry| !entry.1).count();
        failures as f64 / inner.window.len() as f64
    }

    fn prune_window(&self, inner: &mut LimiterInner, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(self.window_ms());
        while inner.window.front().is_some_and(|(at, _)| *at < cutoff) {
            inner.window.pop_front();
        }
    }

    fn maybe_restore(&self, inner: &mut LimiterInner, now_ms: u64) {
        if inner.rate_multiplier >= 1.0 || now_ms < inner.backoff_until_ms {
            return;
        }
        if self.error_rate(inner) < RESTORE_THRESHOLD {
            inner.rate_multiplier = 1.0;
            inner.backoff_until_ms = 0;
            tracing::info!("error rate recovered, restoring full drain rate");
        }
    }

    fn window_ms(&self) -> u64 {
        (self.cfg.error_window_secs * 1000.0) as u64
    }
}

#[cfg(test)]
#[path = "limiter_tests.rs"]
mod tests;
