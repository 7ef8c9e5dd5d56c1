// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! msq-resilience: the outage machinery.
//!
//! Circuit breaker, health probe, recovery scheduler, graduated drain
//! limiter, and the outage history ledger. Components here hold no
//! references to each other or to the worker; transitions are announced
//! through return values and the worker wires consequences together.

mod breaker;
mod limiter;
mod outage;
pub mod probe;
mod recovery;

pub use breaker::{BreakerError, BreakerSnapshot, BreakerState, CircuitBreaker, Transition};
pub use limiter::DrainLimiter;
pub use outage::{OutageError, OutageHistory, OutageMetrics, OutageRecord};
pub use probe::{check, ProbeOutcome};
pub use recovery::{RecoveryError, RecoveryScheduler, RecoveryState};
