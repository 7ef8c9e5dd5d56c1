// SPDX-License-Identifier: MIT

//! Three-state circuit breaker with durable state.
//!
//! CLOSED admits calls and counts failures; OPEN rejects everything until
//! `recovery_timeout` has elapsed, after which the next state read moves to
//! HALF_OPEN; HALF_OPEN admits exactly one in-flight call at a time.
//!
//! State persists to `circuit_breaker.json` on every mutation, guarded by an
//! optimistic version: if another writer advanced the file since we loaded,
//! the write fails instead of clobbering. The worker is the only intended
//! writer; everything else reads.

use msq_core::{BreakerConfig, Clock, ErrorKind};
use msq_storage::atomic_write_json;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BreakerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stale breaker state: disk at version {disk}, ours {ours}")]
    VersionConflict { disk: u64, ours: u64 },
}

/// Breaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

msq_core::display_tags! {
    BreakerState {
        Closed => "closed",
        Open => "open",
        HalfOpen => "half-open",
    }
}

/// A state change worth acting on. The worker observes these return values
/// to drive the outage ledger and the drain limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// CLOSED or HALF_OPEN tripped to OPEN.
    Opened,
    /// OPEN aged into HALF_OPEN.
    HalfOpened,
    /// HALF_OPEN confirmed healthy, circuit closed.
    Closed,
}

/// The durable form in `circuit_breaker.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failure_count: u32,
    pub success_count: u32,
    /// Set while the circuit is OPEN or HALF_OPEN, cleared on close.
    pub opened_at_ms: Option<u64>,
    pub last_transition_at_ms: u64,
    /// Monotonic write counter; guards concurrent writers.
    pub version: u64,
}

impl BreakerSnapshot {
    fn initial(now_ms: u64) -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at_ms: None,
            last_transition_at_ms: now_ms,
            version: 0,
        }
    }
}

struct Inner {
    snap: BreakerSnapshot,
    /// The single HALF_OPEN admission slot.
    half_open_inflight: bool,
}

/// Durable circuit breaker. Single mutating owner (the sync worker);
/// cheap to read from anywhere via [`CircuitBreaker::snapshot`].
pub struct CircuitBreaker<C: Clock> {
    path: PathBuf,
    cfg: BreakerConfig,
    clock: C,
    inner: Mutex<Inner>,
}

impl<C: Clock> CircuitBreaker<C> {
    /// Load persisted state, or bootstrap a CLOSED circuit if none exists.
    pub fn load(path: &Path, cfg: BreakerConfig, clock: C) -> Result<Self, BreakerError> {
        let (snap, bootstrap) = match std::fs::read(path) {
            Ok(bytes) => (serde_json::from_slice(&bytes)?, false),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                (BreakerSnapshot::initial(clock.epoch_ms()), true)
            }
            Err(err) => return Err(err.into()),
        };
        let breaker = Self {
            path: path.to_path_buf(),
            cfg,
            clock,
            inner: Mutex::new(Inner { snap, half_open_inflight: false }),
        };
        if bootstrap {
            let mut inner = breaker.inner.lock();
            breaker.persist(&mut inner.snap)?;
        }
        Ok(breaker)
    }

    /// Current state. Reading may age OPEN into HALF_OPEN once
    /// `recovery_timeout` has elapsed.
    pub fn state(&self) -> Result<BreakerState, BreakerError> {
        let mut inner = self.inner.lock();
        self.age_open(&mut inner)?;
        Ok(inner.snap.state)
    }

    /// Whether a call may proceed right now. In HALF_OPEN only the first
    /// caller gets `true` until the outcome is recorded.
    pub fn allow(&self) -> Result<bool, BreakerError> {
        let mut inner = self.inner.lock();
        self.age_open(&mut inner)?;
        Ok(match inner.snap.state {
            BreakerState::Closed => true,
            BreakerState::Open => false,
            BreakerState::HalfOpen => {
                if inner.half_open_inflight {
                    false
                } else {
                    inner.half_open_inflight = true;
                    true
                }
            }
        })
    }

    /// Record a successful call. Returns [`Transition::Closed`] when this
    /// success closes a HALF_OPEN circuit.
    pub fn record_success(&self) -> Result<Option<Transition>, BreakerError> {
        let mut inner = self.inner.lock();
        self.age_open(&mut inner)?;
        inner.half_open_inflight = false;

        match inner.snap.state {
            BreakerState::Closed => {
                if inner.snap.failure_count > 0 {
                    inner.snap.failure_count = 0;
                    self.persist(&mut inner.snap)?;
                }
                Ok(None)
            }
            BreakerState::HalfOpen => {
                inner.snap.success_count =
                    (inner.snap.success_count + 1).min(self.cfg.success_threshold);
                if inner.snap.success_count >= self.cfg.success_threshold {
                    let now_ms = self.clock.epoch_ms();
                    inner.snap.state = BreakerState::Closed;
                    inner.snap.failure_count = 0;
                    inner.snap.success_count = 0;
                    inner.snap.opened_at_ms = None;
                    inner.snap.last_transition_at_ms = now_ms;
                    self.persist(&mut inner.snap)?;
                    tracing::info!("circuit closed");
                    Ok(Some(Transition::Closed))
                } else {
                    self.persist(&mut inner.snap)?;
                    Ok(None)
                }
            }
            // A success can land after the circuit re-opened; nothing to do.
            BreakerState::Open => Ok(None),
        }
    }

    /// Record a failed call. Only kinds that signal downstream ill health
    /// count toward opening. Returns [`Transition::Opened`] when this
    /// failure trips the circuit.
    pub fn record_failure(&self, kind: ErrorKind) -> Result<Option<Transition>, BreakerError> {
        let mut inner = self.inner.lock();
        self.age_open(&mut inner)?;
        inner.half_open_inflight = false;

        if !kind.counts_toward_breaker() {
            return Ok(None);
        }

        match inner.snap.state {
            BreakerState::Closed => {
                inner.snap.failure_count =
                    (inner.snap.failure_count + 1).min(self.cfg.failure_threshold);
                if inner.snap.failure_count >= self.cfg.failure_threshold {
                    self.trip_open(&mut inner.snap)?;
                    Ok(Some(Transition::Opened))
                } else {
                    self.persist(&mut inner.snap)?;
                    Ok(None)
                }
            }
            BreakerState::HalfOpen => {
                self.trip_open(&mut inner.snap)?;
                Ok(Some(Transition::Opened))
            }
            BreakerState::Open => Ok(None),
        }
    }

    /// Point-in-time copy of the durable state. Does not age OPEN, so it is
    /// safe for read-only callers like the status reporter.
    pub fn snapshot(&self) -> BreakerSnapshot {
        self.inner.lock().snap.clone()
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.cfg
    }

    fn trip_open(&self, snap: &mut BreakerSnapshot) -> Result<(), BreakerError> {
        let now_ms = self.clock.epoch_ms();
        snap.state = BreakerState::Open;
        snap.failure_count = self.cfg.failure_threshold;
        snap.success_count = 0;
        snap.opened_at_ms = Some(now_ms);
        snap.last_transition_at_ms = now_ms;
        self.persist(snap)?;
        tracing::warn!("circuit opened");
        Ok(())
    }

    fn age_open(&self, inner: &mut Inner) -> Result<(), BreakerError> {
        if inner.snap.state != BreakerState::Open {
            return Ok(());
        }
        let now_ms = self.clock.epoch_ms();
        let opened_at_ms = inner.snap.opened_at_ms.unwrap_or(now_ms);
        let timeout_ms = self.cfg.recovery_timeout().as_millis() as u64;
        if now_ms.saturating_sub(opened_at_ms) >= timeout_ms {
            inner.snap.state = BreakerState::HalfOpen;
            inner.snap.success_count = 0;
            inner.snap.last_transition_at_ms = now_ms;
            inner.half_open_inflight = false;
            self.persist(&mut inner.snap)?;
            tracing::info!("circuit half-open, probing downstream");
        }
        Ok(())
    }

    /// Atomic write with optimistic concurrency: refuse to clobber a file
    /// some other writer has advanced past what we loaded.
    fn persist(&self, snap: &mut BreakerSnapshot) -> Result<(), BreakerError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => {
                let disk: BreakerSnapshot = serde_json::from_slice(&bytes)?;
                if disk.version > snap.version {
                    return Err(BreakerError::VersionConflict {
                        disk: disk.version,
                        ours: snap.version,
                    });
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        snap.version += 1;
        atomic_write_json(&self.path, snap)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
