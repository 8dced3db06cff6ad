//! Rebuild the latest episode from a transcript.
//!
//! The transcript is append-only and may hold several unrelated exchanges, so
//! attribution starts at the most recent plain-text user message (the anchor)
//! and only what follows it is collected.

use std::fs;
use std::path::Path;

use chrono::DateTime;
use tracing::{debug, warn};

use super::types::{ContentPart, Episode, TranscriptEntry};
use super::TranscriptError;

/// Reconstruct the latest episode from a transcript file.
///
/// Never fails: a missing or unreadable file yields an empty episode and a
/// warning in the log.
pub fn reconstruct(path: &Path) -> Episode {
    match try_reconstruct(path) {
        Ok(episode) => episode,
        Err(e) => {
            warn!("Transcript: {}", e);
            Episode::default()
        }
    }
}

/// Reconstruct the latest episode, surfacing read errors
pub fn try_reconstruct(path: &Path) -> Result<Episode, TranscriptError> {
    let content = fs::read_to_string(path).map_err(|source| TranscriptError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(reconstruct_from_str(&content))
}

/// Reconstruct the latest episode from transcript text
pub fn reconstruct_from_str(content: &str) -> Episode {
    let (entries, skipped) = parse_entries(content);
    if skipped > 0 {
        debug!("Transcript: skipped {} malformed line(s)", skipped);
    }

    let anchor = match find_anchor(&entries) {
        Some(anchor) => anchor,
        None => {
            debug!("Transcript: no user prompt found");
            return Episode::default();
        }
    };

    let mut episode = Episode {
        prompt: anchor.text_content().map(str::to_string),
        ..Default::default()
    };

    let mut collecting = false;
    let mut texts: Vec<&str> = Vec::new();
    let mut end_time: Option<&str> = None;

    for entry in &entries {
        if !collecting {
            // Re-identify the anchor by position: same kind, role and timestamp
            collecting = entry.is_user_text()
                && entry.entry_type == anchor.entry_type
                && entry.role() == anchor.role()
                && entry.timestamp == anchor.timestamp;
            continue;
        }

        if let Some(ts) = entry.timestamp.as_deref() {
            end_time = Some(ts);
        }

        if !entry.is_assistant() {
            continue;
        }
        if entry.is_error() {
            if let Some(message) = error_message(entry) {
                episode.error = Some(message);
            }
            continue;
        }
        let Some(parts) = entry.parts() else {
            continue;
        };
        // A later regular reply means the session recovered
        episode.error = None;

        for part in parts {
            match part {
                ContentPart::ToolUse { name } => episode.tools.push(name.clone()),
                ContentPart::Text { text } => texts.push(text),
                ContentPart::Other => {}
            }
        }
    }

    let response = texts.join("\n").trim().to_string();
    if !response.is_empty() {
        episode.response = Some(response);
    }

    if let (Some(start), Some(end)) = (anchor.timestamp.as_deref(), end_time) {
        episode.duration_ms = duration_between(start, end);
    }

    episode
}

/// Parse each non-empty line independently; returns entries and the count of skipped lines
fn parse_entries(content: &str) -> (Vec<TranscriptEntry>, usize) {
    let mut entries = Vec::new();
    let mut skipped = 0;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<TranscriptEntry>(line) {
            Ok(entry) => entries.push(entry),
            // The writer may be mid-line; tolerate and move on
            Err(_) => skipped += 1,
        }
    }

    (entries, skipped)
}

/// The most recent plain-text user message
fn find_anchor(entries: &[TranscriptEntry]) -> Option<&TranscriptEntry> {
    entries.iter().rev().find(|entry| entry.is_user_text())
}

fn join_text(parts: &[ContentPart]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Text of an error entry, falling back to its entry-level error code
fn error_message(entry: &TranscriptEntry) -> Option<String> {
    let text = match (entry.parts(), entry.text_content()) {
        (Some(parts), _) => join_text(parts),
        (None, Some(text)) => text.trim().to_string(),
        (None, None) => String::new(),
    };
    if !text.is_empty() {
        return Some(text);
    }
    entry.error_text().map(str::to_string)
}

/// Milliseconds from `start` to `end`, clamped at zero for out-of-order timestamps
fn duration_between(start: &str, end: &str) -> Option<u64> {
    let start = DateTime::parse_from_rfc3339(start).ok()?;
    let end = DateTime::parse_from_rfc3339(end).ok()?;
    let millis = (end - start).num_milliseconds();
    Some(millis.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn user(ts: Option<&str>, text: &str) -> String {
        let mut v = serde_json::json!({
            "type": "user",
            "message": {"role": "user", "content": text}
        });
        if let Some(ts) = ts {
            v["timestamp"] = serde_json::json!(ts);
        }
        v.to_string()
    }

    fn assistant(ts: Option<&str>, parts: serde_json::Value) -> String {
        let mut v = serde_json::json!({
            "type": "assistant",
            "message": {"role": "assistant", "content": parts}
        });
        if let Some(ts) = ts {
            v["timestamp"] = serde_json::json!(ts);
        }
        v.to_string()
    }

    fn tool(name: &str) -> serde_json::Value {
        serde_json::json!({"type": "tool_use", "id": "toolu_x", "name": name, "input": {}})
    }

    fn text(t: &str) -> serde_json::Value {
        serde_json::json!({"type": "text", "text": t})
    }

    fn tool_result(ts: &str) -> String {
        serde_json::json!({
            "type": "user",
            "timestamp": ts,
            "message": {"role": "user", "content": [{"type": "tool_result", "tool_use_id": "toolu_x", "content": "ok"}]}
        })
        .to_string()
    }

    #[test]
    fn test_single_exchange() {
        let log = [
            user(Some("2025-01-01T10:00:00.000Z"), "Fix the login bug"),
            assistant(
                Some("2025-01-01T10:00:01.000Z"),
                serde_json::json!([text("Let me look."), tool("Read")]),
            ),
            tool_result("2025-01-01T10:00:02.000Z"),
            assistant(
                Some("2025-01-01T10:00:03.500Z"),
                serde_json::json!([tool("Edit"), tool("Read")]),
            ),
            assistant(
                Some("2025-01-01T10:00:05.000Z"),
                serde_json::json!([text("Fixed it.")]),
            ),
        ]
        .join("\n");

        let episode = reconstruct_from_str(&log);
        assert_eq!(
            episode,
            Episode {
                prompt: Some("Fix the login bug".to_string()),
                response: Some("Let me look.\nFixed it.".to_string()),
                tools: vec!["Read".into(), "Edit".into(), "Read".into()],
                duration_ms: Some(5000),
                error: None,
            }
        );
    }

    #[test]
    fn test_earlier_exchange_not_attributed() {
        let log = [
            user(Some("2025-01-01T09:00:00Z"), "Old request"),
            assistant(
                Some("2025-01-01T09:00:01Z"),
                serde_json::json!([text("Old answer"), tool("Bash")]),
            ),
            user(Some("2025-01-01T10:00:00Z"), "New request"),
            assistant(
                Some("2025-01-01T10:00:02Z"),
                serde_json::json!([tool("Grep"), text("New answer")]),
            ),
        ]
        .join("\n");

        let episode = reconstruct_from_str(&log);
        assert_eq!(episode.prompt.as_deref(), Some("New request"));
        assert_eq!(episode.tools, vec!["Grep".to_string()]);
        assert_eq!(episode.response.as_deref(), Some("New answer"));
        assert_eq!(episode.duration_ms, Some(2000));
    }

    #[test]
    fn test_identical_prompts_disambiguated_by_timestamp() {
        let log = [
            user(Some("2025-01-01T09:00:00Z"), "continue"),
            assistant(Some("2025-01-01T09:00:04Z"), serde_json::json!([tool("Bash")])),
            user(Some("2025-01-01T10:00:00Z"), "continue"),
            assistant(Some("2025-01-01T10:00:01Z"), serde_json::json!([tool("Write")])),
        ]
        .join("\n");

        let episode = reconstruct_from_str(&log);
        assert_eq!(episode.tools, vec!["Write".to_string()]);
        assert_eq!(episode.duration_ms, Some(1000));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let log = [
            "not json at all".to_string(),
            user(Some("2025-01-01T10:00:00Z"), "Hello"),
            "{\"type\":\"assistant\",\"message\":{\"role\":".to_string(),
            assistant(Some("2025-01-01T10:00:00.250Z"), serde_json::json!([text("Hi")])),
        ]
        .join("\n");

        let episode = reconstruct_from_str(&log);
        assert_eq!(episode.prompt.as_deref(), Some("Hello"));
        assert_eq!(episode.response.as_deref(), Some("Hi"));
        assert_eq!(episode.duration_ms, Some(250));
    }

    #[test]
    fn test_no_valid_entries() {
        let episode = reconstruct_from_str("garbage\n\n{{{\n");
        assert_eq!(episode, Episode::default());
        assert!(episode.tools.is_empty());
    }

    #[test]
    fn test_only_non_message_entries() {
        let log = [
            r#"{"type":"summary","summary":"Session summary"}"#,
            r#"{"type":"system","timestamp":"2025-01-01T10:00:00Z","content":"hook ran"}"#,
        ]
        .join("\n");
        assert_eq!(reconstruct_from_str(&log), Episode::default());
    }

    #[test]
    fn test_anchor_without_timestamp_has_no_duration() {
        let log = [
            user(None, "Do it"),
            assistant(Some("2025-01-01T10:00:05Z"), serde_json::json!([tool("Edit")])),
        ]
        .join("\n");

        let episode = reconstruct_from_str(&log);
        assert_eq!(episode.prompt.as_deref(), Some("Do it"));
        assert_eq!(episode.tools, vec!["Edit".to_string()]);
        assert_eq!(episode.duration_ms, None);
    }

    #[test]
    fn test_no_timestamps_no_duration() {
        let log = [
            user(None, "Do it"),
            assistant(None, serde_json::json!([text("Done")])),
        ]
        .join("\n");

        let episode = reconstruct_from_str(&log);
        assert_eq!(episode.response.as_deref(), Some("Done"));
        assert_eq!(episode.duration_ms, None);
    }

    #[test]
    fn test_out_of_order_timestamps_clamped() {
        let log = [
            user(Some("2025-01-01T10:00:10Z"), "Go"),
            assistant(Some("2025-01-01T10:00:05Z"), serde_json::json!([text("ok")])),
        ]
        .join("\n");

        assert_eq!(reconstruct_from_str(&log).duration_ms, Some(0));
    }

    #[test]
    fn test_anchor_alone_has_no_duration() {
        let log = user(Some("2025-01-01T10:00:00Z"), "Just asked");
        let episode = reconstruct_from_str(&log);
        assert_eq!(episode.prompt.as_deref(), Some("Just asked"));
        assert_eq!(episode.duration_ms, None);
        assert!(episode.response.is_none());
    }

    #[test]
    fn test_api_error_recorded() {
        let error_entry = serde_json::json!({
            "type": "assistant",
            "timestamp": "2025-01-01T10:00:03Z",
            "isApiErrorMessage": true,
            "message": {"role": "assistant", "content": [text("API Error: 529 Overloaded")]}
        })
        .to_string();
        let log = [
            user(Some("2025-01-01T10:00:00Z"), "Refactor"),
            assistant(Some("2025-01-01T10:00:01Z"), serde_json::json!([tool("Read")])),
            error_entry,
        ]
        .join("\n");

        let episode = reconstruct_from_str(&log);
        assert_eq!(episode.error.as_deref(), Some("API Error: 529 Overloaded"));
        assert_eq!(episode.tools, vec!["Read".to_string()]);
        assert!(episode.response.is_none());
    }

    #[test]
    fn test_entry_level_error_recorded() {
        let error_entry = serde_json::json!({
            "type": "assistant",
            "timestamp": "2025-01-01T10:00:02Z",
            "error": "rate_limit",
            "message": {"role": "assistant", "content": [text("API Error: Rate limited")]}
        })
        .to_string();
        let log = [
            user(Some("2025-01-01T10:00:00Z"), "Refactor"),
            assistant(Some("2025-01-01T10:00:01Z"), serde_json::json!([tool("Read")])),
            error_entry,
        ]
        .join("\n");

        let episode = reconstruct_from_str(&log);
        assert_eq!(episode.error.as_deref(), Some("API Error: Rate limited"));
        assert_eq!(episode.tools, vec!["Read".to_string()]);
        assert!(episode.response.is_none());
    }

    #[test]
    fn test_entry_level_error_without_text_uses_code() {
        let error_entry = serde_json::json!({
            "type": "assistant",
            "error": "rate_limit",
            "message": {"role": "assistant", "content": []}
        })
        .to_string();
        let log = [user(None, "Refactor"), error_entry].join("\n");

        let episode = reconstruct_from_str(&log);
        assert_eq!(episode.error.as_deref(), Some("rate_limit"));
    }

    #[test]
    fn test_unrecognized_part_does_not_drop_entry() {
        let log = [
            user(Some("2025-01-01T10:00:00Z"), "Check"),
            assistant(
                Some("2025-01-01T10:00:01Z"),
                serde_json::json!([tool("Read"), text("Done"), {"data": "opaque"}]),
            ),
        ]
        .join("\n");

        let episode = reconstruct_from_str(&log);
        assert_eq!(episode.tools, vec!["Read".to_string()]);
        assert_eq!(episode.response.as_deref(), Some("Done"));
    }

    #[test]
    fn test_reconstruct_missing_file() {
        let episode = reconstruct(Path::new("/nonexistent/transcript.jsonl"));
        assert_eq!(episode, Episode::default());
        assert!(try_reconstruct(Path::new("/nonexistent/transcript.jsonl")).is_err());
    }

    #[test]
    fn test_reconstruct_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", user(Some("2025-01-01T10:00:00Z"), "Read me")).unwrap();
        writeln!(
            file,
            "{}",
            assistant(Some("2025-01-01T10:00:02Z"), serde_json::json!([tool("Read")]))
        )
        .unwrap();

        let episode = reconstruct(file.path());
        assert_eq!(episode.prompt.as_deref(), Some("Read me"));
        assert_eq!(episode.tools, vec!["Read".to_string()]);
        assert_eq!(episode.duration_ms, Some(2000));
    }
}
