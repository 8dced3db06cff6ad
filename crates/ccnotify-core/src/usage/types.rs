//! Usage data types parsed from Claude Code `/usage` output.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Current-session quota as shown by `/usage`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaSnapshot {
    /// Percentage used (0-100)
    pub percentage_used: u8,
    /// Reset info (e.g., "Resets 3pm (America/New_York)" or "2h5m remaining until reset")
    pub reset_description: String,
}

/// How the reset line is reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetFormat {
    /// Keep the `Resets ...` text as rendered
    #[default]
    Verbatim,
    /// Convert a `H:MM am|pm` reset time into time remaining
    Countdown,
}

/// Timings and limits for driving the usage session
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    /// Wait after starting `claude` before typing
    pub startup_delay: Duration,
    /// Wait between keystrokes
    pub key_delay: Duration,
    /// Interval between screen captures while waiting for the report
    pub poll_interval: Duration,
    /// Give up waiting for the report after this long (last capture is still parsed)
    pub render_timeout: Duration,
    /// Upper bound for the whole collection
    pub overall_timeout: Duration,
    /// How to report the reset time
    pub reset_format: ResetFormat,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(5),
            key_delay: Duration::from_millis(500),
            poll_interval: Duration::from_millis(500),
            render_timeout: Duration::from_secs(10),
            overall_timeout: Duration::from_secs(30),
            reset_format: ResetFormat::Verbatim,
        }
    }
}
