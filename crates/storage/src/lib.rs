// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! msq-storage: durable state for the sync queue.
//!
//! Two stores with independent retention share one idiom: an append-only log
//! that is fsynced before an operation reports success, compacted behind an
//! atomic temp-write-then-rename. The persistent queue additionally keeps a
//! compressed snapshot so restarts replay only the log tail.

mod atomic;
mod dlq;
mod lock;
mod queue;
mod snapshot;
mod wal;

pub use atomic::{atomic_write, atomic_write_json, rotate_bak_path};
pub use dlq::{DeadLetterStore, DlqError, DlqRecord, DlqSummary};
pub use lock::FileLock;
pub use queue::{Enqueued, ItemStatus, QueueError, QueuedJob, SyncQueue};
pub use snapshot::{load_snapshot, save_snapshot, Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use wal::{Wal, WalEntry, WalError};
