// SPDX-License-Identifier: MIT

//! Exponential backoff with full jitter.
//!
//! Shared by the queue retry path and the recovery probe schedule. Full
//! jitter draws the delay uniformly from `[0, ceiling]`, which breaks retry
//! synchronization across callers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Compute a retry delay.
///
/// The ceiling doubles per retry: `min(cap, base * 2^retry_count)`, and the
/// returned delay is uniform in `[0, ceiling]`. A `seed` makes the draw
/// deterministic for tests.
pub fn full_jitter(retry_count: u32, base: Duration, cap: Duration, seed: Option<u64>) -> Duration {
    let ceiling = backoff_ceiling(retry_count, base, cap);
    if ceiling.is_zero() {
        return Duration::ZERO;
    }
    let fraction: f64 = match seed {
        Some(seed) => StdRng::seed_from_u64(seed).gen(),
        None => rand::thread_rng().gen(),
    };
    ceiling.mul_f64(fraction)
}

/// The deterministic ceiling the jitter draws under.
pub fn backoff_ceiling(retry_count: u32, base: Duration, cap: Duration) -> Duration {
    // 2^retry saturates well before overflow matters for sane caps
    let factor = 2u64.saturating_pow(retry_count.min(32));
    if factor > u64::from(u32::MAX) {
        return cap;
    }
    base.saturating_mul(factor as u32).min(cap)
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
