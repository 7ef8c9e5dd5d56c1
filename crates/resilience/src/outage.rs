// SPDX-License-Identifier: MIT

//! Outage history ledger.
//!
//! A bounded ring of past outages persisted as an oldest-first JSON array.
//! The worker records a start when the circuit opens and an end when it
//! closes; metrics are computed over completed outages only.

use msq_storage::atomic_write_json;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One circuit-open window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutageRecord {
    pub started_at_ms: u64,
    /// `None` while the outage is ongoing.
    pub ended_at_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    /// Dead-letter entries dated inside the outage window.
    pub jobs_affected: u64,
}

impl OutageRecord {
    pub fn is_open(&self) -> bool {
        self.ended_at_ms.is_none()
    }
}

/// Aggregates over completed outages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutageMetrics {
    /// Mean time to repair, milliseconds.
    pub mttr_ms: f64,
    /// Mean healthy time between consecutive outages, milliseconds.
    /// Zero unless at least two outages completed.
    pub mtbf_ms: f64,
    /// `mtbf / (mtbf + mttr) * 100`; 100 when there is no repair time.
    pub availability_pct: f64,
    pub total_downtime_ms: u64,
    pub outage_count: usize,
}

/// Bounded ring of outage records, durable in `outage_history.json`.
pub struct OutageHistory {
    path: PathBuf,
    capacity: usize,
    records: Mutex<VecDeque<OutageRecord>>,
}

impl OutageHistory {
    pub fn load(path: &Path, capacity: usize) -> Result<Self, OutageError> {
        let mut records: VecDeque<OutageRecord> = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => VecDeque::new(),
            Err(err) => return Err(err.into()),
        };
        // A capacity shrink applies on load: keep the newest.
        while records.len() > capacity {
            records.pop_front();
        }
        Ok(Self { path: path.to_path_buf(), capacity, records: Mutex::new(records) })
    }

    /// Open a new outage. No-op if one is already open, preserving the
    /// single-open-record invariant.
    pub fn record_start(&self, started_at_ms: u64) -> Result<(), OutageError> {
        let mut records = self.records.lock();
        if records.back().is_some_and(OutageRecord::is_open) {
            return Ok(());
        }
        records.push_back(OutageRecord {
            started_at_ms,
            ended_at_ms: None,
            duration_ms: None,
            jobs_affected: 0,
        });
        if records.len() > self.capacity {
            records.pop_front();
        }
        tracing::warn!(started_at_ms, "outage started");
        self.persist(&records)
    }

    /// Close the open outage, if any.
    pub fn record_end(&self, ended_at_ms: u64, jobs_affected: u64) -> Result<(), OutageError> {
        let mut records = self.records.lock();
        let Some(open) = records.back_mut().filter(|r| r.is_open()) else {
            return Ok(());
        };
        open.ended_at_ms = Some(ended_at_ms);
        open.duration_ms = Some(ended_at_ms.saturating_sub(open.started_at_ms));
        open.jobs_affected = jobs_affected;
        tracing::info!(
            duration_ms = open.duration_ms,
            jobs_affected,
            "outage ended"
        );
        self.persist(&records)
    }

    /// Start timestamp of the ongoing outage, if one is open.
    pub fn open_started_at_ms(&self) -> Option<u64> {
        self.records.lock().back().filter(|r| r.is_open()).map(|r| r.started_at_ms)
    }

    /// All records, oldest first (most recent last).
    pub fn history(&self) -> Vec<OutageRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn metrics(&self) -> OutageMetrics {
        let records = self.records.lock();
        let completed: Vec<&OutageRecord> = records.iter().filter(|r| !r.is_open()).collect();

        let outage_count = completed.len();
        let total_downtime_ms: u64 = completed.iter().filter_map(|r| r.duration_ms).sum();
        let mttr_ms = if outage_count > 0 {
            total_downtime_ms as f64 / outage_count as f64
        } else {
            0.0
        };

        let mtbf_ms = if outage_count >= 2 {
            let gaps: Vec<f64> = completed
                .windows(2)
                .filter_map(|pair| {
                    let end = pair[0].ended_at_ms?;
                    Some(pair[1].started_at_ms.saturating_sub(end) as f64)
                })
                .collect();
            gaps.iter().sum::<f64>() / gaps.len() as f64
        } else {
            0.0
        };

        let availability_pct = if mttr_ms == 0.0 {
            100.0
        } else {
            mtbf_ms / (mtbf_ms + mttr_ms) * 100.0
        };

        OutageMetrics { mttr_ms, mtbf_ms, availability_pct, total_downtime_ms, outage_count }
    }

    fn persist(&self, records: &VecDeque<OutageRecord>) -> Result<(), OutageError> {
        atomic_write_json(&self.path, records)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "outage_tests.rs"]
mod tests;
