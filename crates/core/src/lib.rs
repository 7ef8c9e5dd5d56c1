// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! msq-core: Domain types for the media sync queue.
//!
//! Holds the sync job model, the error taxonomy used to classify downstream
//! failures, the clock abstraction that keeps every time-dependent component
//! testable, and the shared backoff calculator.

pub mod macros;

pub mod backoff;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod id;
pub mod job;
pub mod time_fmt;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use backoff::full_jitter;
pub use client::{MediaServer, NotFoundPolicy, SceneIndex, SceneRecord};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    BreakerConfig, DaemonConfig, DlqConfig, LimiterConfig, OutageConfig, ProbeConfig, QueueConfig,
    SyncConfig,
};
pub use error::{ErrorKind, SyncError};
pub use id::{short, IdBuf};
pub use job::{JobId, JobKey, SceneId, SyncJob, UpdateKind};
pub use time_fmt::{format_elapsed, format_elapsed_ms};
