//! Hook input: the JSON payload Claude Code (or a script) pipes to stdin.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::transcript::Episode;

/// Payload fields understood by ccnotify. Every field is optional and
/// unknown fields are ignored.
///
/// Two shapes are accepted: an explicit task report (`prompt`, `tools`,
/// `duration`, `status`, `error`) or a Claude Code hook event carrying
/// `transcript_path`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookPayload {
    pub prompt: Option<String>,
    pub tools: Vec<String>,
    /// Milliseconds
    pub duration: Option<u64>,
    pub status: Option<String>,
    pub error: Option<String>,
    /// Notification text from Claude Code ("Claude needs your permission to use Bash")
    pub message: Option<String>,
    pub transcript_path: Option<PathBuf>,
    pub session_id: Option<String>,
    pub hook_event_name: Option<String>,
    pub cwd: Option<String>,
}

impl HookPayload {
    /// Parse payload text. Empty, malformed or non-object input yields the
    /// empty payload; a field of the wrong type is dropped on its own.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<Value>(text) {
            Ok(value) if value.is_object() => Self::from_value(&value),
            Ok(_) => {
                warn!("Ignoring hook payload that is not a JSON object");
                Self::default()
            }
            Err(e) => {
                warn!("Ignoring malformed hook payload: {}", e);
                Self::default()
            }
        }
    }

    fn from_value(value: &Value) -> Self {
        let string = |key: &str| {
            value
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        Self {
            prompt: string("prompt"),
            tools: value
                .get("tools")
                .and_then(|v| v.as_array())
                .map(|tools| {
                    tools
                        .iter()
                        .filter_map(|t| t.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            duration: value.get("duration").and_then(duration_ms),
            status: string("status"),
            error: value.get("error").and_then(error_text),
            message: string("message"),
            transcript_path: string("transcript_path").map(PathBuf::from),
            session_id: string("session_id"),
            hook_event_name: string("hook_event_name"),
            cwd: string("cwd"),
        }
    }

    /// Episode described directly by the payload (no transcript)
    pub fn to_episode(&self) -> Episode {
        Episode {
            prompt: self.prompt.clone(),
            response: None,
            tools: self.tools.clone(),
            duration_ms: self.duration,
            error: self.error.clone(),
        }
    }
}

/// Whole or fractional non-negative milliseconds
fn duration_ms(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| ms.round() as u64)
    })
}

/// A reported error: a string, or a structured error kept as compact JSON
fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) | Value::Array(_) => Some(value.to_string()),
        _ => None,
    }
}

/// Read and parse a payload from `reader`, giving up after `timeout`.
///
/// Reading happens on a plain thread so a writer that never closes the
/// stream cannot keep the process alive.
pub async fn read_payload<R>(mut reader: R, timeout: Duration) -> HookPayload
where
    R: Read + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut buf = String::new();
        let result = reader.read_to_string(&mut buf).map(|_| buf);
        let _ = tx.send(result);
    });

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(Ok(text))) => {
            debug!("Read {} bytes of hook input", text.len());
            HookPayload::parse(&text)
        }
        Ok(Ok(Err(e))) => {
            warn!("Failed to read hook input: {}", e);
            HookPayload::default()
        }
        Ok(Err(_)) => HookPayload::default(),
        Err(_) => {
            warn!("Timed out after {:?} waiting for hook input", timeout);
            HookPayload::default()
        }
    }
}
