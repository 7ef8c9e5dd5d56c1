// SPDX-License-Identifier: MIT

//! Error taxonomy for downstream sync failures.
//!
//! Every failure the downstream client reports is classified into one
//! [`ErrorKind`]. The worker dispatches on the kind: retryable kinds are
//! nacked back onto the queue, permanent kinds go straight to the dead-letter
//! store, and only genuine health signals count toward opening the circuit
//! breaker.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a sync failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Network timeout, connection reset, 5xx-class response.
    Transient,
    /// Explicit unavailability: 503, connection refused.
    DownstreamDown,
    /// Downstream asked us to slow down. Not a health signal.
    RateLimited,
    /// The record to sync does not exist downstream.
    NotFound,
    /// Invalid credentials.
    Auth,
    /// Authenticated but forbidden.
    Permission,
    /// Malformed payload, schema violation.
    PermanentData,
    /// Local bug or unexpected failure in our own code.
    Internal,
}

impl ErrorKind {
    /// Kinds that indicate the downstream is unhealthy and count toward
    /// opening the circuit breaker.
    pub fn counts_toward_breaker(self) -> bool {
        matches!(self, ErrorKind::Transient | ErrorKind::DownstreamDown)
    }

    /// Kinds that are never worth retrying.
    pub fn is_permanent(self) -> bool {
        matches!(self, ErrorKind::Auth | ErrorKind::Permission | ErrorKind::PermanentData)
    }

    /// Kinds the dead-letter recovery pipeline must never re-enqueue.
    pub fn is_recovery_denied(self) -> bool {
        self.is_permanent()
    }
}

crate::display_tags! {
    ErrorKind {
        Transient => "transient",
        DownstreamDown => "downstream-down",
        RateLimited => "rate-limited",
        NotFound => "not-found",
        Auth => "auth",
        Permission => "permission",
        PermanentData => "permanent-data",
        Internal => "internal",
    }
}

/// A classified sync failure reported by a downstream client or raised
/// locally during dispatch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("downstream unavailable: {0}")]
    DownstreamDown(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("not found downstream: {0}")]
    NotFound(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("invalid payload: {0}")]
    PermanentData(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Transient(_) => ErrorKind::Transient,
            SyncError::DownstreamDown(_) => ErrorKind::DownstreamDown,
            SyncError::RateLimited(_) => ErrorKind::RateLimited,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::Auth(_) => ErrorKind::Auth,
            SyncError::Permission(_) => ErrorKind::Permission,
            SyncError::PermanentData(_) => ErrorKind::PermanentData,
            SyncError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SyncError::Transient(m)
            | SyncError::DownstreamDown(m)
            | SyncError::RateLimited(m)
            | SyncError::NotFound(m)
            | SyncError::Auth(m)
            | SyncError::Permission(m)
            | SyncError::PermanentData(m)
            | SyncError::Internal(m) => m,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
