// SPDX-License-Identifier: MIT

//! Operator command implementations.

use anyhow::Context;
use msq_core::{MediaServer, SceneIndex, SyncConfig, SystemClock};
use msq_engine::{
    recover_outage_jobs, RecoveryPolicy, RecoveryReport, StatusReport, SyncHook, SyncWorker,
};
use msq_resilience::{probe, CircuitBreaker, OutageHistory, RecoveryScheduler};
use msq_storage::{DeadLetterStore, FileLock, SyncQueue};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::paths::DataPaths;

/// The wired-up durable stores and resilience components.
pub struct Components {
    pub queue: Arc<Mutex<SyncQueue<SystemClock>>>,
    pub dlq: Arc<Mutex<DeadLetterStore>>,
    pub breaker: Arc<CircuitBreaker<SystemClock>>,
    pub scheduler: Arc<RecoveryScheduler<SystemClock>>,
    pub history: Arc<OutageHistory>,
    pub cfg: SyncConfig,
    pub clock: SystemClock,
}

impl Components {
    pub fn open(paths: &DataPaths, cfg: SyncConfig) -> anyhow::Result<Self> {
        let clock = SystemClock;
        let queue = SyncQueue::open(paths.queue_dir(), cfg.queue.clone(), clock.clone())
            .context("opening sync queue")?;
        let dlq =
            DeadLetterStore::open(&paths.dead_letters()).context("opening dead-letter store")?;
        let breaker =
            CircuitBreaker::load(&paths.circuit_breaker(), cfg.breaker.clone(), clock.clone())
                .context("loading circuit breaker state")?;
        let scheduler = RecoveryScheduler::load(
            &paths.recovery_state(),
            &paths.recovery_lock(),
            cfg.probe.clone(),
            clock.clone(),
        )
        .context("loading recovery state")?;
        let history = OutageHistory::load(&paths.outage_history(), cfg.outage.capacity)
            .context("loading outage history")?;

        Ok(Self {
            queue: Arc::new(Mutex::new(queue)),
            dlq: Arc::new(Mutex::new(dlq)),
            breaker: Arc::new(breaker),
            scheduler: Arc::new(scheduler),
            history: Arc::new(history),
            cfg,
            clock,
        })
    }

    /// Upstream-facing enqueue handle for an embedding integration.
    pub fn hook(&self) -> SyncHook<SystemClock> {
        SyncHook::new(self.queue.clone(), self.clock.clone())
    }
}

/// Load the config file if present, defaults otherwise.
pub fn load_config(paths: &DataPaths, explicit: Option<&std::path::Path>) -> anyhow::Result<SyncConfig> {
    match explicit {
        Some(path) => SyncConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => {
            let default_path = paths.config_file();
            if default_path.exists() {
                SyncConfig::load(&default_path)
                    .with_context(|| format!("loading {}", default_path.display()))
            } else {
                Ok(SyncConfig::default())
            }
        }
    }
}

/// `msqd run`: spawn the worker and block until SIGINT/SIGTERM.
pub async fn run(
    paths: &DataPaths,
    cfg: SyncConfig,
    server: Arc<dyn MediaServer>,
) -> anyhow::Result<()> {
    let _guard = FileLock::try_exclusive(&paths.daemon_lock())
        .context("taking daemon lock")?
        .ok_or_else(|| anyhow::anyhow!("another msqd is already running for this data directory"))?;

    let components = Components::open(paths, cfg)?;
    let worker = SyncWorker::new(
        components.queue.clone(),
        components.dlq.clone(),
        components.breaker.clone(),
        components.scheduler.clone(),
        components.history.clone(),
        server,
        components.cfg.clone(),
        components.clock.clone(),
    );

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(worker.run(shutdown.clone()));

    wait_for_signal().await;
    tracing::info!("shutdown signal received");
    shutdown.cancel();
    handle.await.context("joining worker task")?;
    Ok(())
}

/// `msqd status`: print the operator snapshot.
pub fn status(paths: &DataPaths, cfg: SyncConfig) -> anyhow::Result<StatusReport> {
    let components = Components::open(paths, cfg)?;
    Ok(StatusReport::collect(
        &components.queue,
        &components.dlq,
        &components.breaker,
        &components.scheduler,
        &components.history,
        &components.cfg.daemon,
        &components.clock,
    ))
}

/// `msqd health`: one probe against the downstream.
pub async fn health(cfg: &SyncConfig, server: &dyn MediaServer) -> probe::ProbeOutcome {
    probe::check(server, cfg.probe.timeout(), &SystemClock).await
}

/// `msqd recover`: re-enqueue dead-lettered jobs from a window.
#[allow(clippy::too_many_arguments)]
pub async fn recover(
    paths: &DataPaths,
    cfg: SyncConfig,
    server: &dyn MediaServer,
    index: &dyn SceneIndex,
    since: TimeSpec,
    until: Option<TimeSpec>,
    extended: bool,
) -> anyhow::Result<RecoveryReport> {
    let components = Components::open(paths, cfg)?;
    let clock = components.clock.clone();
    let now_ms = msq_core::Clock::epoch_ms(&clock);

    let start_ms = since.resolve(now_ms);
    let end_ms = until.map_or(now_ms, |u| u.resolve(now_ms));
    anyhow::ensure!(start_ms <= end_ms, "window start is after its end");

    let policy = if extended { RecoveryPolicy::extended() } else { RecoveryPolicy::safe() };
    Ok(recover_outage_jobs(
        start_ms,
        end_ms,
        &policy,
        &components.queue,
        &components.dlq,
        server,
        index,
        components.cfg.probe.timeout(),
        &clock,
    )
    .await)
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(err) => {
                tracing::error!(error = %err, "cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// A point in time given on the command line: either an absolute epoch in
/// seconds, or an age like `90m`, `6h`, `2d` relative to now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeSpec {
    EpochSecs(f64),
    Ago(std::time::Duration),
}

impl TimeSpec {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let text = text.trim();
        anyhow::ensure!(!text.is_empty(), "empty time spec");

        if let Some(number) = text.strip_suffix(['s', 'm', 'h', 'd']) {
            let unit = match text.chars().last() {
                Some('s') => 1u64,
                Some('m') => 60,
                Some('h') => 3_600,
                Some('d') => 86_400,
                _ => unreachable!("strip_suffix matched"),
            };
            let n: u64 = number.parse().with_context(|| format!("bad time spec {text:?}"))?;
            return Ok(TimeSpec::Ago(std::time::Duration::from_secs(n * unit)));
        }

        let secs: f64 = text.parse().with_context(|| format!("bad time spec {text:?}"))?;
        anyhow::ensure!(secs >= 0.0, "epoch seconds cannot be negative");
        Ok(TimeSpec::EpochSecs(secs))
    }

    pub fn resolve(self, now_ms: u64) -> u64 {
        match self {
            TimeSpec::EpochSecs(secs) => (secs * 1000.0) as u64,
            TimeSpec::Ago(age) => now_ms.saturating_sub(age.as_millis() as u64),
        }
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
