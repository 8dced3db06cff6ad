//! Parse Claude Code `/usage` output from captured tmux pane content.

use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;

use super::types::QuotaSnapshot;

/// Header of the block we report on
const SESSION_MARKER: &str = "Current session";
/// Header of the following block; scanning stops here
const WEEK_MARKER: &str = "Current week";

static PERCENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)%\s*used").expect("Invalid PERCENT_PATTERN regex"));

static RESETS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Resets.*$").expect("Invalid RESETS_PATTERN regex"));

/// 12-hour clock time, minutes optional ("2:59pm", "3 pm", "11:05 AM")
static CLOCK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").expect("Invalid CLOCK_PATTERN regex")
});

/// Parse the "Current session" block of `/usage` output.
///
/// Expected format:
/// ```text
///   Current session
///   ████████████████████████████████████               72% used
///   Resets 1am (Asia/Tokyo)
///
///   Current week (all models)
///   ███████████▌                                       23% used
///   Resets Mar 3, 12am (Asia/Tokyo)
/// ```
///
/// Returns `None` when the block is missing or carries neither a non-zero
/// percentage nor a reset line.
pub fn parse_usage_output(text: &str) -> Option<QuotaSnapshot> {
    let mut in_section = false;
    let mut percentage: Option<u8> = None;
    let mut reset = String::new();

    for line in text.lines() {
        if !in_section {
            if line.contains(SESSION_MARKER) {
                in_section = true;
            }
            continue;
        }

        if percentage.is_none() {
            percentage = extract_percent(line);
        }

        if let Some(m) = RESETS_PATTERN.find(line) {
            reset = m.as_str().trim().to_string();
            // The reset line closes the block
            break;
        }

        if line.contains(WEEK_MARKER) {
            break;
        }
    }

    let percentage_used = percentage.unwrap_or(0);
    if percentage_used == 0 && reset.is_empty() {
        return None;
    }

    Some(QuotaSnapshot {
        percentage_used,
        reset_description: reset,
    })
}

/// Extract percentage from a line containing "N% used"
fn extract_percent(line: &str) -> Option<u8> {
    let caps = PERCENT_PATTERN.captures(line)?;
    let value: u32 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.min(100) as u8)
}

/// Render a reset line as time remaining from `now`.
///
/// Finds a 12-hour clock time in `reset` and counts forward to its next
/// occurrence, rolling over to tomorrow when it has already passed today.
/// Returns `None` when the line carries no clock time (e.g. "Resets Mar 3").
pub fn countdown_from(reset: &str, now: NaiveTime) -> Option<String> {
    let caps = CLOCK_PATTERN.captures(reset)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if hour == 0 || hour > 12 {
        return None;
    }
    let pm = caps.get(3)?.as_str().eq_ignore_ascii_case("pm");
    let hour24 = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };
    let target = NaiveTime::from_hms_opt(hour24, minute, 0)?;

    let mut seconds = (target - now).num_seconds();
    if seconds <= 0 {
        seconds += 24 * 60 * 60;
    }
    let total_minutes = seconds / 60;
    let (h, m) = (total_minutes / 60, total_minutes % 60);

    Some(if h > 0 {
        format!("{}h{}m remaining until reset", h, m)
    } else {
        format!("{}m remaining until reset", m)
    })
}
