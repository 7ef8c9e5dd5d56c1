// SPDX-License-Identifier: MIT

//! Configuration for the sync queue daemon.
//!
//! Loaded from a TOML file; every option has a compiled-in default so an
//! empty file (or no file) is a valid configuration. Unknown keys are
//! rejected rather than silently ignored.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SyncConfig {
    pub queue: QueueConfig,
    pub breaker: BreakerConfig,
    pub limiter: LimiterConfig,
    pub probe: ProbeConfig,
    pub dlq: DlqConfig,
    pub outage: OutageConfig,
    pub daemon: DaemonConfig,
}

impl SyncConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

/// Persistent queue tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct QueueConfig {
    /// Checkpoint (snapshot + WAL truncate) after this many acked jobs.
    pub checkpoint_every: u32,
    /// Base delay for nack retry backoff, seconds.
    pub retry_base_secs: f64,
    /// Cap for nack retry backoff, seconds.
    pub retry_cap_secs: f64,
    /// Retries allowed for internal (classification) errors before the job
    /// is dead-lettered.
    pub internal_retry_cap: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { checkpoint_every: 256, retry_base_secs: 2.0, retry_cap_secs: 120.0, internal_retry_cap: 3 }
    }
}

impl QueueConfig {
    pub fn retry_base(&self) -> Duration {
        Duration::from_secs_f64(self.retry_base_secs)
    }

    pub fn retry_cap(&self) -> Duration {
        Duration::from_secs_f64(self.retry_cap_secs)
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BreakerConfig {
    /// Consecutive counted failures before CLOSED trips to OPEN.
    pub failure_threshold: u32,
    /// Successes in HALF_OPEN before the circuit closes.
    pub success_threshold: u32,
    /// Seconds OPEN before the next state read moves to HALF_OPEN.
    pub recovery_timeout_secs: f64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, success_threshold: 1, recovery_timeout_secs: 60.0 }
    }
}

impl BreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.recovery_timeout_secs)
    }
}

/// Graduated drain rate limiting after recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LimiterConfig {
    /// Jobs per second at the start of the recovery ramp.
    pub initial_rate: f64,
    /// Jobs per second at the end of the ramp.
    pub target_rate: f64,
    /// Ramp length, seconds.
    pub ramp_secs: f64,
    /// Error fraction in the sliding window that halves the rate.
    pub error_threshold: f64,
    /// Sliding result window, seconds.
    pub error_window_secs: f64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            initial_rate: 5.0,
            target_rate: 20.0,
            ramp_secs: 300.0,
            error_threshold: 0.30,
            error_window_secs: 60.0,
        }
    }
}

/// Recovery probe scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProbeConfig {
    /// Base probe interval, seconds.
    pub base_secs: f64,
    /// Probe interval cap, seconds.
    pub cap_secs: f64,
    /// Per-probe timeout, seconds. Deliberately short; real sync calls get
    /// their own longer timeout.
    pub timeout_secs: f64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { base_secs: 5.0, cap_secs: 60.0, timeout_secs: 5.0 }
    }
}

impl ProbeConfig {
    pub fn base(&self) -> Duration {
        Duration::from_secs_f64(self.base_secs)
    }

    pub fn cap(&self) -> Duration {
        Duration::from_secs_f64(self.cap_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

/// Dead-letter store retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DlqConfig {
    pub retention_days: u32,
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self { retention_days: 30 }
    }
}

/// Outage history ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OutageConfig {
    pub capacity: usize,
}

impl Default for OutageConfig {
    fn default() -> Self {
        Self { capacity: 30 }
    }
}

/// Daemon-level knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DaemonConfig {
    /// Downstream sync call timeout, seconds.
    pub sync_timeout_secs: f64,
    /// Status report flags attention once the breaker has been OPEN this long.
    pub attention_open_secs: u64,
    /// Status report flags attention once the DLQ holds this many entries.
    pub attention_dlq_count: usize,
    /// Log to this file instead of stderr.
    pub log_file: Option<std::path::PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            sync_timeout_secs: 30.0,
            attention_open_secs: 900,
            attention_dlq_count: 1,
            log_file: None,
        }
    }
}

impl DaemonConfig {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.sync_timeout_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
