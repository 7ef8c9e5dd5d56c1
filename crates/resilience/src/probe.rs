// SPDX-License-Identifier: MIT

//! Stateless deep-health probe.
//!
//! Calls the media server's data-path health check under a short timeout.
//! The probe never mutates breaker or scheduler state and logs at debug
//! level only; interpreting the outcome is the scheduler's job.

use msq_core::{Clock, MediaServer};
use std::time::Duration;

/// Result of one probe attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub healthy: bool,
    pub latency: Duration,
}

/// Probe the downstream once. A timeout counts as unhealthy.
pub async fn check<C: Clock>(server: &dyn MediaServer, timeout: Duration, clock: &C) -> ProbeOutcome {
    let started = clock.now();
    match tokio::time::timeout(timeout, server.health_probe()).await {
        Ok(Ok(())) => {
            let latency = clock.now().saturating_duration_since(started);
            tracing::debug!(latency_ms = latency.as_millis() as u64, "health probe ok");
            ProbeOutcome { healthy: true, latency }
        }
        Ok(Err(err)) => {
            let latency = clock.now().saturating_duration_since(started);
            tracing::debug!(error = %err, "health probe failed");
            ProbeOutcome { healthy: false, latency }
        }
        Err(_) => {
            tracing::debug!(timeout_ms = timeout.as_millis() as u64, "health probe timed out");
            ProbeOutcome { healthy: false, latency: timeout }
        }
    }
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
