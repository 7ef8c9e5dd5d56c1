// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! msq-daemon: the `msqd` binary.
//!
//! Wires the durable stores and resilience components into a running worker
//! and exposes the operator commands (`run`, `status`, `health`, `recover`).
//! Concrete media-server and scene-index transports are supplied by an
//! integration at link time; without one, stub clients keep the daemon
//! operable and every sync fails downstream-down.

pub mod commands;
pub mod paths;
pub mod stub;

pub use commands::{Components, TimeSpec};
pub use paths::DataPaths;
pub use stub::{UnconfiguredMediaServer, UnconfiguredSceneIndex};
