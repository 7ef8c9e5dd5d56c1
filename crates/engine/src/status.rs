// SPDX-License-Identifier: MIT

//! Operator status snapshot.
//!
//! Read-only over the durable stores: nothing here mutates breaker,
//! scheduler, or queue state, so the status command is safe to run while
//! a worker owns them.

use msq_core::{format_elapsed_ms, Clock, DaemonConfig, ErrorKind};
use msq_resilience::{
    BreakerSnapshot, BreakerState, CircuitBreaker, OutageHistory, OutageMetrics, OutageRecord,
    RecoveryScheduler, RecoveryState,
};
use msq_storage::{DeadLetterStore, SyncQueue};
use parking_lot::Mutex;
use serde::Serialize;

/// How many outages the report lists.
const RECENT_OUTAGES: usize = 10;

/// Point-in-time operator snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub generated_at_ms: u64,
    pub queue_len: usize,
    pub dlq_len: usize,
    pub breaker: BreakerSnapshot,
    /// Milliseconds the circuit has been open, when it is.
    pub breaker_open_for_ms: Option<u64>,
    pub recovery: RecoveryState,
    /// Last ten outages, most recent last.
    pub outages: Vec<OutageRecord>,
    pub metrics: OutageMetrics,
    /// Dead-letter counts grouped by error kind, largest first.
    pub dlq_by_kind: Vec<(ErrorKind, usize)>,
    pub needs_attention: bool,
    pub attention_reasons: Vec<String>,
}

impl StatusReport {
    pub fn collect<C: Clock>(
        queue: &Mutex<SyncQueue<C>>,
        dlq: &Mutex<DeadLetterStore>,
        breaker: &CircuitBreaker<C>,
        scheduler: &RecoveryScheduler<C>,
        history: &OutageHistory,
        cfg: &DaemonConfig,
        clock: &C,
    ) -> Self {
        let now_ms = clock.epoch_ms();
        let queue_len = queue.lock().len();
        let (dlq_len, dlq_counts) = {
            let dlq = dlq.lock();
            (dlq.len(), dlq.counts_by_kind())
        };

        let snapshot = breaker.snapshot();
        let breaker_open_for_ms = match snapshot.state {
            BreakerState::Open | BreakerState::HalfOpen => {
                snapshot.opened_at_ms.map(|at| now_ms.saturating_sub(at))
            }
            BreakerState::Closed => None,
        };

        let mut outages = history.history();
        if outages.len() > RECENT_OUTAGES {
            outages.drain(..outages.len() - RECENT_OUTAGES);
        }

        let mut dlq_by_kind: Vec<(ErrorKind, usize)> = dlq_counts.into_iter().collect();
        dlq_by_kind.sort_by(|a, b| b.1.cmp(&a.1));

        let mut attention_reasons = Vec::new();
        if dlq_len >= cfg.attention_dlq_count {
            attention_reasons.push(format!("{dlq_len} dead-lettered jobs need review"));
        }
        if snapshot.state == BreakerState::Open {
            if let Some(open_for_ms) = breaker_open_for_ms {
                if open_for_ms >= cfg.attention_open_secs * 1000 {
                    attention_reasons.push(format!(
                        "circuit open for {}",
                        format_elapsed_ms(open_for_ms)
                    ));
                }
            }
        }

        Self {
            generated_at_ms: now_ms,
            queue_len,
            dlq_len,
            breaker: snapshot,
            breaker_open_for_ms,
            recovery: scheduler.state(),
            outages,
            metrics: history.metrics(),
            dlq_by_kind,
            needs_attention: !attention_reasons.is_empty(),
            attention_reasons,
        }
    }
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "sync queue status")?;
        writeln!(f, "  queue:         {} pending", self.queue_len)?;
        writeln!(f, "  dead letters:  {}", self.dlq_len)?;

        match (self.breaker.state, self.breaker_open_for_ms) {
            (state, Some(open_for_ms)) => {
                writeln!(f, "  circuit:       {} (for {})", state, format_elapsed_ms(open_for_ms))?
            }
            (state, None) => writeln!(f, "  circuit:       {state}")?,
        }

        if self.recovery.last_check_at_ms > 0 {
            let ago = self.generated_at_ms.saturating_sub(self.recovery.last_check_at_ms);
            writeln!(
                f,
                "  last probe:    {} ({} ms) {} ago",
                if self.recovery.last_check_healthy { "healthy" } else { "unhealthy" },
                self.recovery.last_probe_latency_ms,
                format_elapsed_ms(ago),
            )?;
        }

        write!(f, "  recoveries:    {}", self.recovery.recovery_count)?;
        if self.recovery.last_recovery_at_ms > 0 {
            let ago = self.generated_at_ms.saturating_sub(self.recovery.last_recovery_at_ms);
            write!(f, " (last {} ago)", format_elapsed_ms(ago))?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "  availability:  {:.1}% (mttr {}, mtbf {}, downtime {})",
            self.metrics.availability_pct,
            format_elapsed_ms(self.metrics.mttr_ms as u64),
            format_elapsed_ms(self.metrics.mtbf_ms as u64),
            format_elapsed_ms(self.metrics.total_downtime_ms),
        )?;

        if !self.dlq_by_kind.is_empty() {
            writeln!(f, "  failures by kind:")?;
            for (kind, count) in &self.dlq_by_kind {
                writeln!(f, "    {kind}: {count}")?;
            }
        }

        if !self.outages.is_empty() {
            writeln!(f, "  recent outages:")?;
            for outage in &self.outages {
                match outage.duration_ms {
                    Some(duration_ms) => writeln!(
                        f,
                        "    {} down, {} jobs affected",
                        format_elapsed_ms(duration_ms),
                        outage.jobs_affected,
                    )?,
                    None => {
                        let so_far = self.generated_at_ms.saturating_sub(outage.started_at_ms);
                        writeln!(f, "    ongoing, {} so far", format_elapsed_ms(so_far))?
                    }
                }
            }
        }

        if self.needs_attention {
            writeln!(f, "  needs attention:")?;
            for reason in &self.attention_reasons {
                writeln!(f, "    - {reason}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
