// SPDX-License-Identifier: MIT

use super::*;
use msq_core::FakeClock;

fn limiter(clock: &FakeClock) -> DrainLimiter<FakeClock> {
    DrainLimiter::new(LimiterConfig::default(), clock.clone())
}

#[test]
fn no_wait_outside_recovery() {
    let clock = FakeClock::new();
    let rl = limiter(&clock);

    assert!(!rl.is_in_recovery());
    for _ in 0..100 {
        assert_eq!(rl.should_wait(), Duration::ZERO);
    }
}

#[test]
fn record_result_outside_recovery_has_no_side_effect() {
    let clock = FakeClock::new();
    let rl = limiter(&clock);

    for _ in 0..20 {
        rl.record_result(false);
    }
    assert_eq!(rl.rate_multiplier(), 1.0);
    assert_eq!(rl.should_wait(), Duration::ZERO);
}

#[test]
fn first_job_after_recovery_is_free_then_waits() {
    let clock = FakeClock::new();
    let rl = limiter(&clock);
    rl.start_recovery_period();

    // Bucket starts full: one job goes through immediately.
    assert_eq!(rl.should_wait(), Duration::ZERO);

    // The next job must wait for a refill at the initial rate (5/s → 200ms).
    let wait = rl.should_wait();
    assert!(wait > Duration::ZERO);
    assert!(wait <= Duration::from_millis(200));
}

#[test]
fn tokens_refill_at_initial_rate() {
    let clock = FakeClock::new();
    let rl = limiter(&clock);
    rl.start_recovery_period();

    assert_eq!(rl.should_wait(), Duration::ZERO);
    clock.advance(Duration::from_millis(200)); // exactly one token at 5/s
    assert_eq!(rl.should_wait(), Duration::ZERO);

    // No time passed since the refill, so the bucket is empty again.
    assert!(rl.should_wait() > Duration::ZERO);
}

#[test]
fn rate_ramps_linearly_to_target() {
    let clock = FakeClock::new();
    let rl = limiter(&clock);
    rl.start_recovery_period();

    assert!((rl.current_rate() - 5.0).abs() < 1e-9);

    clock.advance(Duration::from_secs(150)); // half the ramp
    assert!((rl.current_rate() - 12.5).abs() < 1e-9);

    clock.advance(Duration::from_secs(150)); // ramp boundary
    assert!((rl.current_rate() - 20.0).abs() < 1e-9);
    assert!(!rl.is_in_recovery(), "period ends exactly at the boundary");
}

#[test]
fn rate_is_monotone_during_ramp() {
    let clock = FakeClock::new();
    let rl = limiter(&clock);
    rl.start_recovery_period();

    let mut last = 0.0;
    for _ in 0..30 {
        let rate = rl.current_rate();
        assert!(rate >= last);
        last = rate;
        clock.advance(Duration::from_secs(10));
    }
}

#[test]
fn resume_picks_up_mid_ramp() {
    let clock = FakeClock::new();
    let rl = limiter(&clock);

    // Restart 60s into a previously persisted recovery period.
    let anchor = clock.epoch_ms() - 60_000;
    rl.resume_recovery_period(anchor);

    assert!(rl.is_in_recovery());
    // 60s into the ramp: 5 + 15 * (60/300) = 8 jobs/s, not starting over.
    assert!((rl.current_rate() - 8.0).abs() < 1e-9);

    clock.advance(Duration::from_secs(240));
    assert!(!rl.is_in_recovery(), "ramp measures from the stored anchor");
}

#[test]
fn error_spike_halves_rate() {
    let clock = FakeClock::new();
    let rl = limiter(&clock);
    rl.start_recovery_period();

    // 40% failures in the window crosses the 30% threshold.
    for n in 0..10 {
        rl.record_result(n % 10 >= 4);
    }

    assert_eq!(rl.rate_multiplier(), 0.5);
    assert!((rl.current_rate() - 2.5).abs() < 1e-9);
}

#[test]
fn backoff_holds_until_expiry_and_low_error_rate() {
    let clock = FakeClock::new();
    let rl = limiter(&clock);
    rl.start_recovery_period();

    for _ in 0..4 {
        rl.record_result(false);
    }
    for _ in 0..6 {
        rl.record_result(true);
    }
    assert_eq!(rl.rate_multiplier(), 0.5);

    // Still backing off: successes inside the backoff window do not restore.
    clock.advance(Duration::from_secs(30));
    rl.record_result(true);
    assert_eq!(rl.rate_multiplier(), 0.5);

    // Backoff expired and the old failures have slid out of the window.
    clock.advance(Duration::from_secs(31));
    rl.record_result(true);
    assert_eq!(rl.rate_multiplier(), 1.0);
}

#[test]
fn multiplier_stays_halved_while_errors_persist_past_expiry() {
    let clock = FakeClock::new();
    let rl = limiter(&clock);
    rl.start_recovery_period();

    for _ in 0..10 {
        rl.record_result(false);
    }
    assert_eq!(rl.rate_multiplier(), 0.5);

    // Backoff expires but the window still shows failures.
    clock.advance(Duration::from_secs(61));
    for _ in 0..2 {
        rl.record_result(false);
        rl.record_result(true);
    }
    assert_eq!(rl.rate_multiplier(), 0.5, "50% errors must not restore");
}

#[test]
fn end_recovery_clears_everything() {
    let clock = FakeClock::new();
    let rl = limiter(&clock);
    rl.start_recovery_period();
    for _ in 0..10 {
        rl.record_result(false);
    }

    rl.end_recovery_period();

    assert!(!rl.is_in_recovery());
    assert_eq!(rl.rate_multiplier(), 1.0);
    assert_eq!(rl.recovery_started_at_ms(), 0);
    assert_eq!(rl.should_wait(), Duration::ZERO);
}

#[test]
fn start_is_idempotent_during_active_ramp() {
    let clock = FakeClock::new();
    let rl = limiter(&clock);

    rl.start_recovery_period();
    let anchor = rl.recovery_started_at_ms();

    clock.advance(Duration::from_secs(100));
    rl.start_recovery_period();
    assert_eq!(rl.recovery_started_at_ms(), anchor, "ramp must not restart");

    // After the ramp lapses, a fresh recovery period may begin.
    clock.advance(Duration::from_secs(300));
    rl.start_recovery_period();
    assert_eq!(rl.recovery_started_at_ms(), clock.epoch_ms());
}
