//! Turn an episode and quota snapshot into a notification.

use super::message::{NotificationMessage, COLOR_FAILURE, COLOR_PENDING, COLOR_SUCCESS};
use crate::transcript::Episode;
use crate::usage::QuotaSnapshot;

pub const TITLE_COMPLETED: &str = "Task Completed";
pub const TITLE_FAILED: &str = "Task Failed";
pub const TITLE_WAITING: &str = "Waiting for Input";

const NO_PROMPT: &str = "No prompt provided";
const NO_TOOLS: &str = "None";
const UNKNOWN_DURATION: &str = "Unknown";
const DEFAULT_WAITING: &str = "Claude is waiting for your input";

/// Status value that marks a successful run
const STATUS_SUCCESS: &str = "success";

/// Human-readable duration: `850ms`, `2.5s`, `3m 7s`
pub fn format_duration(ms: u64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let secs = ms / 1000;
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Aggregate tool names in first-seen order: `Read (2), Edit (1)`
pub fn summarize_tools(tools: &[String]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for tool in tools {
        match counts.iter_mut().find(|(name, _)| *name == tool.as_str()) {
            Some((_, count)) => *count += 1,
            None => counts.push((tool.as_str(), 1)),
        }
    }

    if counts.is_empty() {
        return NO_TOOLS.to_string();
    }

    counts
        .iter()
        .map(|(name, count)| format!("{} ({})", name, count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `23% used · Resets 3pm (America/New_York)`
pub fn format_quota(quota: &QuotaSnapshot) -> String {
    if quota.reset_description.is_empty() {
        format!("{}% used", quota.percentage_used)
    } else {
        format!(
            "{}% used · {}",
            quota.percentage_used, quota.reset_description
        )
    }
}

/// A run failed when an error was reported or the status is anything but success
pub fn is_failure(episode: &Episode, status: Option<&str>) -> bool {
    episode.error.is_some() || status.is_some_and(|s| s != STATUS_SUCCESS)
}

/// Message for a finished task
pub fn task_message(
    episode: &Episode,
    status: Option<&str>,
    quota: Option<&QuotaSnapshot>,
) -> NotificationMessage {
    let failed = is_failure(episode, status);
    let (title, color) = if failed {
        (TITLE_FAILED, COLOR_FAILURE)
    } else {
        (TITLE_COMPLETED, COLOR_SUCCESS)
    };

    let mut message = NotificationMessage::new(title, color)
        .field("Prompt", episode.prompt.as_deref().unwrap_or(NO_PROMPT))
        .field("Tools Used", summarize_tools(&episode.tools))
        .field(
            "Duration",
            episode
                .duration_ms
                .map(format_duration)
                .unwrap_or_else(|| UNKNOWN_DURATION.to_string()),
        );

    if let Some(response) = &episode.response {
        message = message.field("Response", response);
    }
    if failed {
        let error = episode
            .error
            .clone()
            .or_else(|| status.map(|s| format!("Status: {}", s)))
            .unwrap_or_default();
        message = message.field("Error", error);
    }
    if let Some(quota) = quota {
        message = message.field("Usage", format_quota(quota));
    }

    message
}

/// Message for "the assistant is waiting on you"
pub fn waiting_message(
    notice: Option<&str>,
    episode: &Episode,
    quota: Option<&QuotaSnapshot>,
) -> NotificationMessage {
    let mut message = NotificationMessage::new(TITLE_WAITING, COLOR_PENDING)
        .field("Message", notice.unwrap_or(DEFAULT_WAITING))
        .field("Prompt", episode.prompt.as_deref().unwrap_or(NO_PROMPT));

    if let Some(quota) = quota {
        message = message.field("Usage", format_quota(quota));
    }

    message
}
