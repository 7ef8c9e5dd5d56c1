// SPDX-License-Identifier: MIT

//! Human-readable elapsed durations for operator output ("5m 30s", "1h 15m").

use std::time::Duration;

/// Format an elapsed duration the way the status report prints it.
///
/// Sub-minute durations show seconds only; sub-hour durations show minutes
/// and seconds; anything longer shows hours and minutes.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    if total_secs < 60 {
        return format!("{}s", total_secs);
    }
    if total_secs < 3600 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        return format!("{}m {}s", mins, secs);
    }
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    format!("{}h {}m", hours, mins)
}

/// [`format_elapsed`] over an epoch-milliseconds difference.
pub fn format_elapsed_ms(elapsed_ms: u64) -> String {
    format_elapsed(Duration::from_millis(elapsed_ms))
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
