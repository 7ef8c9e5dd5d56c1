// SPDX-License-Identifier: MIT

use super::*;
use msq_core::{BreakerConfig, ErrorKind, FakeClock};
use std::time::Duration;
use tempfile::tempdir;

fn scheduler(dir: &Path, clock: &FakeClock) -> RecoveryScheduler<FakeClock> {
    RecoveryScheduler::load(
        &dir.join("recovery_state.json"),
        &dir.join("recovery.lock"),
        ProbeConfig::default(),
        clock.clone(),
    )
    .unwrap()
    .with_jitter_seed(7)
}

fn open_breaker(dir: &Path, clock: &FakeClock) -> CircuitBreaker<FakeClock> {
    let cb = CircuitBreaker::load(
        &dir.join("circuit_breaker.json"),
        BreakerConfig::default(),
        clock.clone(),
    )
    .unwrap();
    for _ in 0..5 {
        cb.record_failure(ErrorKind::DownstreamDown).unwrap();
    }
    cb
}

fn healthy() -> ProbeOutcome {
    ProbeOutcome { healthy: true, latency: Duration::from_millis(12) }
}

fn unhealthy() -> ProbeOutcome {
    ProbeOutcome { healthy: false, latency: Duration::from_secs(5) }
}

#[test]
fn no_check_while_closed() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let sched = scheduler(dir.path(), &clock);

    assert!(!sched.should_check(BreakerState::Closed));
}

#[test]
fn first_check_is_due_immediately_when_open() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let sched = scheduler(dir.path(), &clock);

    assert!(sched.should_check(BreakerState::Open));
}

#[test]
fn truthful_should_check_blocks_second_ask_until_recorded() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let sched = scheduler(dir.path(), &clock);
    let cb = open_breaker(dir.path(), &clock);

    assert!(sched.should_check(BreakerState::Open));
    // The pair is atomic: a second ask before record_check is refused.
    assert!(!sched.should_check(BreakerState::Open));

    sched.record_check(unhealthy(), &cb).unwrap();
    // Recording released the lock; once the backoff elapses, checks resume.
    clock.advance(Duration::from_secs(60));
    assert!(sched.should_check(BreakerState::Open));
}

#[test]
fn unhealthy_probes_back_off_and_success_resets() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let sched = scheduler(dir.path(), &clock);
    let cb = open_breaker(dir.path(), &clock);

    // First failure: next check within the 5s base ceiling.
    assert!(sched.should_check(BreakerState::Open));
    sched.record_check(unhealthy(), &cb).unwrap();
    let s = sched.state();
    assert_eq!(s.consecutive_failures, 1);
    let delay1 = s.next_check_at_ms - clock.epoch_ms();
    assert!(delay1 <= 5_000);

    clock.advance(Duration::from_millis(delay1));
    assert!(sched.should_check(BreakerState::Open));
    sched.record_check(unhealthy(), &cb).unwrap();
    let s = sched.state();
    assert_eq!(s.consecutive_failures, 2);
    assert!(s.next_check_at_ms - clock.epoch_ms() <= 10_000);

    // Success snaps the interval back to base.
    clock.advance(Duration::from_secs(60));
    assert!(sched.should_check(BreakerState::Open));
    sched.record_check(healthy(), &cb).unwrap();
    let s = sched.state();
    assert_eq!(s.consecutive_failures, 0);
    assert_eq!(s.consecutive_successes, 1);
    assert_eq!(s.next_check_at_ms - clock.epoch_ms(), 5_000);
}

#[test]
fn healthy_probe_in_half_open_closes_breaker_and_stamps_recovery() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let sched = scheduler(dir.path(), &clock);
    let cb = open_breaker(dir.path(), &clock);

    clock.advance(Duration::from_secs(60));
    assert_eq!(cb.state().unwrap(), BreakerState::HalfOpen);

    assert!(sched.should_check(BreakerState::HalfOpen));
    let transition = sched.record_check(healthy(), &cb).unwrap();

    assert_eq!(transition, Some(Transition::Closed));
    assert_eq!(cb.state().unwrap(), BreakerState::Closed);

    let s = sched.state();
    assert_eq!(s.recovery_count, 1);
    assert_eq!(s.last_recovery_at_ms, clock.epoch_ms());
    assert_eq!(s.recovery_started_at_ms, clock.epoch_ms());
}

#[test]
fn healthy_probe_while_open_does_not_close() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let sched = scheduler(dir.path(), &clock);
    let cb = open_breaker(dir.path(), &clock);

    // Downstream is back, but the recovery timeout has not elapsed.
    assert!(sched.should_check(BreakerState::Open));
    let transition = sched.record_check(healthy(), &cb).unwrap();

    assert_eq!(transition, None);
    assert_eq!(cb.state().unwrap(), BreakerState::Open);
    assert_eq!(sched.state().recovery_count, 0);
}

#[test]
fn clear_recovery_period_zeroes_the_ramp_anchor() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let sched = scheduler(dir.path(), &clock);

    sched.mark_recovered().unwrap();
    assert_ne!(sched.state().recovery_started_at_ms, 0);

    sched.clear_recovery_period().unwrap();
    assert_eq!(sched.state().recovery_started_at_ms, 0);
}

#[test]
fn state_survives_reload() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();

    {
        let sched = scheduler(dir.path(), &clock);
        let cb = open_breaker(dir.path(), &clock);
        assert!(sched.should_check(BreakerState::Open));
        sched.record_check(unhealthy(), &cb).unwrap();
        sched.mark_recovered().unwrap();
    }

    let sched = scheduler(dir.path(), &clock);
    let s = sched.state();
    assert_eq!(s.consecutive_failures, 1);
    assert_eq!(s.recovery_count, 1);
    assert_ne!(s.recovery_started_at_ms, 0);
}

#[test]
fn probe_latency_is_retained_for_status() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let sched = scheduler(dir.path(), &clock);
    let cb = open_breaker(dir.path(), &clock);

    assert!(sched.should_check(BreakerState::Open));
    sched.record_check(healthy(), &cb).unwrap();

    let s = sched.state();
    assert_eq!(s.last_probe_latency_ms, 12);
    assert!(s.last_check_healthy);
}
