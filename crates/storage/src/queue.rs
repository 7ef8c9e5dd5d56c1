// SPDX-License-Identifier: MIT

//! Persistent FIFO job queue with ack/nack semantics.
//!
//! Event-sourced: every mutation appends one [`QueueEvent`] to the WAL before
//! the call returns, and an in-memory [`QueueState`] materializes the log.
//! Checkpoints fold the log into a compressed snapshot and truncate it.
//!
//! Crash behavior: a job whose `enqueue` returned is durable; a job taken but
//! neither acked nor nacked at crash time reappears as ready on the next
//! open (resume-on-load).

use crate::snapshot::{load_snapshot, save_snapshot, Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
use crate::wal::{Wal, WalError};
use msq_core::{Clock, JobId, JobKey, QueueConfig, SceneId, SyncJob};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job {id} is {status}, expected {expected}")]
    BadStatus { id: JobId, status: ItemStatus, expected: ItemStatus },
}

/// Queue item lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting to be taken (possibly delayed by `next_visible_at_ms`).
    Ready,
    /// Handed to a worker, outcome pending.
    InFlight,
    /// Consumed successfully; pruned at the next checkpoint.
    Acked,
    /// Permanently failed; the caller has dead-lettered it.
    Failed,
}

msq_core::display_tags! {
    ItemStatus {
        Ready => "ready",
        InFlight => "in-flight",
        Acked => "acked",
        Failed => "failed",
    }
}

/// Durable queue mutations, one WAL entry each.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum QueueEvent {
    Pushed { job: SyncJob },
    Taken { id: JobId },
    Acked { id: JobId },
    Nacked { id: JobId, next_visible_at_ms: u64 },
    Failed { id: JobId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueueItem {
    job: SyncJob,
    status: ItemStatus,
    retry_count: u32,
    /// Epoch ms before which `take` skips this item. Zero = immediately.
    next_visible_at_ms: u64,
}

/// Materialized queue state, FIFO by push order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct QueueState {
    items: Vec<QueueItem>,
}

impl QueueState {
    /// Apply one event. Handlers are idempotent: replaying the same event
    /// twice leaves the same state as applying it once.
    fn apply(&mut self, event: &QueueEvent) {
        match event {
            QueueEvent::Pushed { job } => {
                if !self.items.iter().any(|i| i.job.id == job.id) {
                    self.items.push(QueueItem {
                        job: job.clone(),
                        status: ItemStatus::Ready,
                        retry_count: 0,
                        next_visible_at_ms: 0,
                    });
                }
            }
            QueueEvent::Taken { id } => {
                if let Some(item) = self.find_mut(*id) {
                    item.status = ItemStatus::InFlight;
                }
            }
            QueueEvent::Acked { id } => {
                if let Some(item) = self.find_mut(*id) {
                    item.status = ItemStatus::Acked;
                }
            }
            QueueEvent::Nacked { id, next_visible_at_ms } => {
                if let Some(item) = self.find_mut(*id) {
                    // Idempotency: only count the retry on the state transition
                    if item.status != ItemStatus::Ready {
                        item.retry_count += 1;
                    }
                    item.status = ItemStatus::Ready;
                    item.next_visible_at_ms = *next_visible_at_ms;
                }
            }
            QueueEvent::Failed { id } => {
                if let Some(item) = self.find_mut(*id) {
                    item.status = ItemStatus::Failed;
                }
            }
        }
    }

    fn find_mut(&mut self, id: JobId) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|i| i.job.id == id)
    }

    fn find(&self, id: JobId) -> Option<&QueueItem> {
        self.items.iter().find(|i| i.job.id == id)
    }

    /// Drop consumed items and revert interrupted ones. Runs at open and
    /// before every snapshot.
    fn compact(&mut self) {
        self.items
            .retain(|i| !matches!(i.status, ItemStatus::Acked | ItemStatus::Failed));
    }

    fn resume_in_flight(&mut self) {
        for item in &mut self.items {
            if item.status == ItemStatus::InFlight {
                item.status = ItemStatus::Ready;
                item.next_visible_at_ms = 0;
            }
        }
    }
}

/// A job handed to the worker, with its retry history.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    pub job: SyncJob,
    pub retry_count: u32,
}

/// Result of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Newly added under this id.
    Added(JobId),
    /// An equivalent job (same scene, same update kind) is already queued.
    Duplicate(JobId),
}

impl Enqueued {
    pub fn id(&self) -> JobId {
        match self {
            Enqueued::Added(id) | Enqueued::Duplicate(id) => *id,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Enqueued::Duplicate(_))
    }
}

/// The persistent sync queue.
pub struct SyncQueue<C: Clock> {
    wal: Wal<QueueEvent>,
    state: QueueState,
    snapshot_path: PathBuf,
    cfg: QueueConfig,
    clock: C,
    acked_since_checkpoint: u32,
}

impl<C: Clock> SyncQueue<C> {
    /// Open the queue in `dir`, replaying snapshot + WAL tail.
    pub fn open(dir: &Path, cfg: QueueConfig, clock: C) -> Result<Self, QueueError> {
        let snapshot_path = dir.join("queue.snapshot");
        let wal_path = dir.join("queue.wal");

        let snapshot: Option<Snapshot<QueueState>> = load_snapshot(&snapshot_path)?;
        let (snapshot_seq, mut state) = match snapshot {
            Some(s) => (s.seq, s.state),
            None => (0, QueueState::default()),
        };

        let (wal, entries) = Wal::open(&wal_path, snapshot_seq)?;
        let mut replayed = 0usize;
        for entry in &entries {
            if entry.seq > snapshot_seq {
                state.apply(&entry.event);
                replayed += 1;
            }
        }

        state.resume_in_flight();
        state.compact();

        tracing::debug!(
            dir = %dir.display(),
            snapshot_seq,
            replayed,
            ready = state.items.len(),
            "opened sync queue"
        );

        Ok(Self {
            wal,
            state,
            snapshot_path,
            cfg,
            clock,
            acked_since_checkpoint: 0,
        })
    }

    /// Append a job. Deduplicates by job key against everything currently
    /// ready or in flight; the duplicate case does not touch the log.
    pub fn enqueue(&mut self, job: SyncJob) -> Result<Enqueued, QueueError> {
        let key = job.job_key();
        if let Some(existing) = self.queued_item_with_key(key) {
            tracing::debug!(scene_id = %job.scene_id, "enqueue deduplicated");
            return Ok(Enqueued::Duplicate(existing));
        }

        let id = job.id;
        let event = QueueEvent::Pushed { job };
        self.wal.append(&event)?;
        self.state.apply(&event);
        tracing::debug!(job_id = %id, "job enqueued");
        Ok(Enqueued::Added(id))
    }

    /// Take the oldest ready job whose visibility delay has passed.
    pub fn take(&mut self) -> Result<Option<QueuedJob>, QueueError> {
        let now_ms = self.clock.epoch_ms();
        let Some(item) = self
            .state
            .items
            .iter()
            .find(|i| i.status == ItemStatus::Ready && i.next_visible_at_ms <= now_ms)
        else {
            return Ok(None);
        };
        let taken = QueuedJob { job: item.job.clone(), retry_count: item.retry_count };

        let event = QueueEvent::Taken { id: taken.job.id };
        self.wal.append(&event)?;
        self.state.apply(&event);
        Ok(Some(taken))
    }

    /// Consume an in-flight job.
    pub fn ack(&mut self, id: JobId) -> Result<(), QueueError> {
        self.expect_in_flight(id)?;
        let event = QueueEvent::Acked { id };
        self.wal.append(&event)?;
        self.state.apply(&event);

        self.acked_since_checkpoint += 1;
        if self.acked_since_checkpoint >= self.cfg.checkpoint_every {
            self.checkpoint()?;
        }
        Ok(())
    }

    /// Return an in-flight job to ready, delayed by `delay`.
    pub fn nack(&mut self, id: JobId, delay: Duration) -> Result<(), QueueError> {
        self.expect_in_flight(id)?;
        let next_visible_at_ms = self.clock.deadline_ms(delay);
        let event = QueueEvent::Nacked { id, next_visible_at_ms };
        self.wal.append(&event)?;
        self.state.apply(&event);
        Ok(())
    }

    /// Remove an in-flight job permanently. The caller records it in the
    /// dead-letter store.
    pub fn fail(&mut self, id: JobId) -> Result<(), QueueError> {
        self.expect_in_flight(id)?;
        let event = QueueEvent::Failed { id };
        self.wal.append(&event)?;
        self.state.apply(&event);
        Ok(())
    }

    /// Jobs pending or in flight.
    pub fn len(&self) -> usize {
        self.state
            .items
            .iter()
            .filter(|i| matches!(i.status, ItemStatus::Ready | ItemStatus::InFlight))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scene ids of every job pending or in flight, for recovery dedup.
    pub fn queued_scene_ids(&self) -> HashSet<SceneId> {
        self.state
            .items
            .iter()
            .filter(|i| matches!(i.status, ItemStatus::Ready | ItemStatus::InFlight))
            .map(|i| i.job.scene_id.clone())
            .collect()
    }

    /// Fold the log into a snapshot and truncate it.
    pub fn checkpoint(&mut self) -> Result<(), QueueError> {
        self.state.compact();
        let snapshot = Snapshot {
            version: CURRENT_SNAPSHOT_VERSION,
            seq: self.wal.write_seq(),
            state: self.state.clone(),
            created_at_ms: self.clock.epoch_ms(),
        };
        save_snapshot(&self.snapshot_path, &snapshot)?;
        self.wal.truncate()?;
        self.acked_since_checkpoint = 0;
        tracing::debug!(seq = snapshot.seq, items = self.state.items.len(), "queue checkpoint");
        Ok(())
    }

    fn queued_item_with_key(&self, key: JobKey) -> Option<JobId> {
        self.state
            .items
            .iter()
            .find(|i| {
                matches!(i.status, ItemStatus::Ready | ItemStatus::InFlight)
                    && i.job.job_key() == key
            })
            .map(|i| i.job.id)
    }

    fn expect_in_flight(&self, id: JobId) -> Result<(), QueueError> {
        let item = self.state.find(id).ok_or(QueueError::NotFound(id))?;
        if item.status != ItemStatus::InFlight {
            return Err(QueueError::BadStatus {
                id,
                status: item.status,
                expected: ItemStatus::InFlight,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
