// SPDX-License-Identifier: MIT

//! Dead-letter store for permanently failed jobs.
//!
//! Kept separate from the queue so long retention never bloats the hot path.
//! Records append to a JSONL file, one line per failure, fsynced before
//! `add` returns; the retention sweep rewrites the file atomically.
//!
//! `failed_at` is stored as epoch milliseconds. Loads additionally accept
//! numeric epoch seconds and RFC 3339 text left behind by older writers,
//! normalizing at the boundary.

use crate::atomic::atomic_write;
use msq_core::{ErrorKind, SceneId, SyncJob};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DlqError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt dead-letter entry at {path}:{line}: {detail}")]
    Corrupt { path: PathBuf, line: usize, detail: String },
}

/// One permanently failed job with its error context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlqRecord {
    /// Monotonic per-store id.
    pub id: u64,
    pub scene_id: SceneId,
    pub kind: ErrorKind,
    pub message: String,
    /// Rendered error chain at the failure site.
    pub trace: String,
    pub retry_count: u32,
    /// Epoch milliseconds.
    #[serde(deserialize_with = "de_failed_at_ms")]
    pub failed_at_ms: u64,
    /// The failed job, whole, so recovery can re-enqueue a copy.
    pub job: SyncJob,
}

/// Payload-free view for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DlqSummary {
    pub id: u64,
    pub scene_id: SceneId,
    pub kind: ErrorKind,
    pub message: String,
    pub retry_count: u32,
    pub failed_at_ms: u64,
}

impl From<&DlqRecord> for DlqSummary {
    fn from(r: &DlqRecord) -> Self {
        Self {
            id: r.id,
            scene_id: r.scene_id.clone(),
            kind: r.kind,
            message: r.message.clone(),
            retry_count: r.retry_count,
            failed_at_ms: r.failed_at_ms,
        }
    }
}

/// Append-only dead-letter store.
#[derive(Debug)]
pub struct DeadLetterStore {
    path: PathBuf,
    writer: BufWriter<File>,
    records: Vec<DlqRecord>,
    next_id: u64,
}

impl DeadLetterStore {
    pub fn open(path: &Path) -> Result<Self, DlqError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().read(true).append(true).create(true).open(path)?;
        let mut text = String::new();
        file.read_to_string(&mut text)?;

        let mut records = Vec::new();
        let line_count = text.lines().count();
        let ends_complete = text.is_empty() || text.ends_with('\n');
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DlqRecord>(line) {
                Ok(record) => records.push(record),
                Err(_) if idx + 1 == line_count && !ends_complete => {
                    // Torn final line from a crash mid-append.
                    tracing::warn!(path = %path.display(), "dropping torn dead-letter tail");
                }
                Err(err) => {
                    return Err(DlqError::Corrupt {
                        path: path.to_path_buf(),
                        line: idx + 1,
                        detail: err.to_string(),
                    });
                }
            }
        }

        let next_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        Ok(Self { path: path.to_path_buf(), writer: BufWriter::new(file), records, next_id })
    }

    /// Record a permanent failure; durable when this returns.
    pub fn add(
        &mut self,
        job: &SyncJob,
        kind: ErrorKind,
        message: impl Into<String>,
        trace: impl Into<String>,
        retry_count: u32,
        failed_at_ms: u64,
    ) -> Result<u64, DlqError> {
        let record = DlqRecord {
            id: self.next_id,
            scene_id: job.scene_id.clone(),
            kind,
            message: message.into(),
            trace: trace.into(),
            retry_count,
            failed_at_ms,
            job: job.clone(),
        };

        let line = serde_json::to_string(&record)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;

        tracing::info!(
            scene_id = %record.scene_id,
            kind = %kind,
            retry_count,
            "job dead-lettered"
        );

        self.next_id += 1;
        self.records.push(record);
        Ok(self.next_id - 1)
    }

    /// Most recent entries first, payloads elided.
    pub fn recent(&self, limit: usize) -> Vec<DlqSummary> {
        self.records.iter().rev().take(limit).map(DlqSummary::from).collect()
    }

    pub fn get(&self, id: u64) -> Option<&DlqRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Entry counts grouped by error kind, for the status report.
    pub fn counts_by_kind(&self) -> HashMap<ErrorKind, usize> {
        let mut counts = HashMap::new();
        for record in &self.records {
            *counts.entry(record.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Entries with `failed_at` in `[start_ms, end_ms]` (both inclusive),
    /// optionally restricted to a set of error kinds.
    pub fn entries_in_window(
        &self,
        start_ms: u64,
        end_ms: u64,
        kinds: Option<&HashSet<ErrorKind>>,
    ) -> Vec<&DlqRecord> {
        self.records
            .iter()
            .filter(|r| r.failed_at_ms >= start_ms && r.failed_at_ms <= end_ms)
            .filter(|r| kinds.map_or(true, |k| k.contains(&r.kind)))
            .collect()
    }

    /// Entries in the window regardless of kind. Used for outage
    /// jobs-affected accounting.
    pub fn count_in_window(&self, start_ms: u64, end_ms: u64) -> usize {
        self.entries_in_window(start_ms, end_ms, None).len()
    }

    /// Drop entries older than `retention_days`. Rewrites the file
    /// atomically; returns how many were pruned.
    pub fn prune_older_than_days(&mut self, retention_days: u32, now_ms: u64) -> Result<usize, DlqError> {
        let cutoff_ms = now_ms.saturating_sub(u64::from(retention_days) * 86_400_000);
        let before = self.records.len();
        self.records.retain(|r| r.failed_at_ms >= cutoff_ms);
        let pruned = before - self.records.len();
        if pruned == 0 {
            return Ok(0);
        }

        let mut contents = Vec::new();
        for record in &self.records {
            serde_json::to_writer(&mut contents, record)?;
            contents.push(b'\n');
        }
        atomic_write(&self.path, &contents)?;

        // Reopen the append handle against the rewritten file.
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);

        tracing::info!(pruned, retention_days, "dead-letter retention sweep");
        Ok(pruned)
    }
}

/// Accept epoch ms (int), epoch seconds (float or small int), or RFC 3339
/// text, normalizing to epoch milliseconds.
fn de_failed_at_ms<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
    }

    // Integer epochs below this are seconds (covers dates through year 5138);
    // millisecond epochs are three orders of magnitude larger.
    const SECONDS_CUTOFF: u64 = 100_000_000_000;

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) if n < SECONDS_CUTOFF => Ok(n * 1000),
        Raw::Int(n) => Ok(n),
        Raw::Float(secs) => Ok((secs * 1000.0) as u64),
        Raw::Text(text) => {
            if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&text) {
                return Ok(dt.timestamp_millis().max(0) as u64);
            }
            let naive = chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S")
                .map_err(serde::de::Error::custom)?;
            Ok(naive.and_utc().timestamp_millis().max(0) as u64)
        }
    }
}

#[cfg(test)]
#[path = "dlq_tests.rs"]
mod tests;
