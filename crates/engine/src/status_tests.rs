// SPDX-License-Identifier: MIT

use super::*;
use msq_core::test_support::metadata_job;
use msq_core::{BreakerConfig, FakeClock, ProbeConfig, QueueConfig};
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    clock: FakeClock,
    queue: Mutex<SyncQueue<FakeClock>>,
    dlq: Mutex<DeadLetterStore>,
    breaker: CircuitBreaker<FakeClock>,
    scheduler: RecoveryScheduler<FakeClock>,
    history: OutageHistory,
    cfg: DaemonConfig,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let clock = FakeClock::new();
        let queue = Mutex::new(
            SyncQueue::open(dir.path(), QueueConfig::default(), clock.clone()).unwrap(),
        );
        let dlq = Mutex::new(DeadLetterStore::open(&dir.path().join("dlq.jsonl")).unwrap());
        let breaker = CircuitBreaker::load(
            &dir.path().join("circuit_breaker.json"),
            BreakerConfig::default(),
            clock.clone(),
        )
        .unwrap();
        let scheduler = RecoveryScheduler::load(
            &dir.path().join("recovery_state.json"),
            &dir.path().join("recovery.lock"),
            ProbeConfig::default(),
            clock.clone(),
        )
        .unwrap();
        let history = OutageHistory::load(&dir.path().join("outage_history.json"), 30).unwrap();
        Self { _dir: dir, clock, queue, dlq, breaker, scheduler, history, cfg: DaemonConfig::default() }
    }

    fn collect(&self) -> StatusReport {
        StatusReport::collect(
            &self.queue,
            &self.dlq,
            &self.breaker,
            &self.scheduler,
            &self.history,
            &self.cfg,
            &self.clock,
        )
    }
}

#[test]
fn quiet_system_reports_clean() {
    let fx = Fixture::new();
    let report = fx.collect();

    assert_eq!(report.queue_len, 0);
    assert_eq!(report.dlq_len, 0);
    assert_eq!(report.breaker.state, BreakerState::Closed);
    assert_eq!(report.breaker_open_for_ms, None);
    assert!(!report.needs_attention);
    assert_eq!(report.metrics.availability_pct, 100.0);
}

#[test]
fn counts_queue_and_dlq() {
    let fx = Fixture::new();
    fx.queue.lock().enqueue(metadata_job("scene-1", 0)).unwrap();
    fx.queue.lock().enqueue(metadata_job("scene-2", 0)).unwrap();
    let job = metadata_job("scene-3", 0);
    fx.dlq.lock().add(&job, ErrorKind::Auth, "m", "t", 0, 500).unwrap();

    let report = fx.collect();
    assert_eq!(report.queue_len, 2);
    assert_eq!(report.dlq_len, 1);
    assert_eq!(report.dlq_by_kind, vec![(ErrorKind::Auth, 1)]);
}

#[test]
fn open_breaker_reports_age() {
    let fx = Fixture::new();
    for _ in 0..5 {
        fx.breaker.record_failure(ErrorKind::DownstreamDown).unwrap();
    }
    fx.clock.advance(Duration::from_secs(30));

    let report = fx.collect();
    assert_eq!(report.breaker.state, BreakerState::Open);
    assert_eq!(report.breaker_open_for_ms, Some(30_000));
}

#[test]
fn collect_does_not_age_the_breaker() {
    let fx = Fixture::new();
    for _ in 0..5 {
        fx.breaker.record_failure(ErrorKind::DownstreamDown).unwrap();
    }
    // Well past the recovery timeout: a worker's state read would flip to
    // half-open, but status must stay read-only.
    fx.clock.advance(Duration::from_secs(600));

    let report = fx.collect();
    assert_eq!(report.breaker.state, BreakerState::Open);
    assert_eq!(fx.breaker.snapshot().state, BreakerState::Open);
}

#[test]
fn dlq_presence_flags_attention() {
    let fx = Fixture::new();
    let job = metadata_job("scene-1", 0);
    fx.dlq.lock().add(&job, ErrorKind::PermanentData, "m", "t", 0, 500).unwrap();

    let report = fx.collect();
    assert!(report.needs_attention);
    assert_eq!(report.attention_reasons.len(), 1);
}

#[test]
fn long_open_circuit_flags_attention() {
    let fx = Fixture::new();
    for _ in 0..5 {
        fx.breaker.record_failure(ErrorKind::DownstreamDown).unwrap();
    }
    fx.clock.advance(Duration::from_secs(901));

    let report = fx.collect();
    assert!(report.needs_attention);
    assert!(report.attention_reasons.iter().any(|r| r.contains("circuit open")));
}

#[test]
fn outage_list_is_bounded_to_ten_most_recent() {
    let fx = Fixture::new();
    for n in 0..15u64 {
        fx.history.record_start(n * 10_000).unwrap();
        fx.history.record_end(n * 10_000 + 1_000, 0).unwrap();
    }

    let report = fx.collect();
    assert_eq!(report.outages.len(), 10);
    assert_eq!(report.outages.last().unwrap().started_at_ms, 140_000);
}

#[test]
fn render_mentions_the_essentials() {
    let fx = Fixture::new();
    fx.queue.lock().enqueue(metadata_job("scene-1", 0)).unwrap();
    fx.history.record_start(fx.clock.epoch_ms()).unwrap();
    fx.clock.advance(Duration::from_secs(330));
    fx.history.record_end(fx.clock.epoch_ms(), 3).unwrap();

    let text = fx.collect().to_string();
    assert!(text.contains("queue:         1 pending"));
    assert!(text.contains("circuit:       closed"));
    assert!(text.contains("5m 30s down, 3 jobs affected"));
}
