// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! msq-engine: orchestration around the durable stores.
//!
//! The sync worker drains the persistent queue through the circuit breaker
//! and drain limiter, routes failures per the error taxonomy, and keeps the
//! outage ledger. The event hook feeds the queue; the recovery pipeline
//! re-enqueues dead-lettered jobs after an outage; the status reporter
//! snapshots everything for operators.

pub mod hook;
pub mod recover;
pub mod status;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use hook::SyncHook;
pub use recover::{recover_outage_jobs, RecoveryPolicy, RecoveryReport};
pub use status::StatusReport;
pub use worker::{Iteration, SyncWorker, WorkerError};
