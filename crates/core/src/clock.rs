// SPDX-License-Identifier: MIT

//! Time source for the sync queue.
//!
//! Everything durable in msq is stamped in epoch milliseconds (`u64`):
//! queue visibility delays, dead-letter `failed_at`, breaker `opened_at`,
//! probe due times, the drain-ramp anchor. [`Clock`] is the single source
//! of those stamps, plus a monotonic instant for latency measurement, so a
//! [`FakeClock`] can drive whole outage timelines in tests without
//! sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where a component reads the current time.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic instant, for measuring elapsed intervals (probe latency).
    fn now(&self) -> Instant;

    /// Wall clock as milliseconds since the Unix epoch. The stamp written
    /// into every durable record.
    fn epoch_ms(&self) -> u64;

    /// Epoch stamp `after` from now. Visibility delays, probe due times,
    /// and limiter backoffs are all stored through this.
    fn deadline_ms(&self, after: Duration) -> u64 {
        self.epoch_ms() + after.as_millis() as u64
    }
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Epoch stamp tests start from, so expected values are plain numbers.
const FAKE_EPOCH_START_MS: u64 = 1_000_000;

/// Test clock that only moves when told to.
///
/// Holds one shared millisecond offset; both views derive from it, so the
/// monotonic and wall-clock timelines can never drift apart the way two
/// independently-set values could. Sub-millisecond advances are dropped,
/// matching the resolution of the durable stamps.
#[derive(Clone)]
pub struct FakeClock {
    started: Instant,
    advanced_ms: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { started: Instant::now(), advanced_ms: Arc::new(AtomicU64::new(0)) }
    }

    /// Move both time views forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.advanced_ms.fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.started + Duration::from_millis(self.advanced_ms.load(Ordering::SeqCst))
    }

    fn epoch_ms(&self) -> u64 {
        FAKE_EPOCH_START_MS + self.advanced_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
