//! Transcript entry and episode types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One line of a Claude Code transcript (`~/.claude/projects/<hash>/<session>.jsonl`).
///
/// Only the fields needed to rebuild an episode are modeled; everything else
/// in the line is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptEntry {
    /// Entry kind ("user", "assistant", "summary", "system", ...)
    #[serde(rename = "type", default)]
    pub entry_type: String,
    /// ISO-8601 timestamp
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Message body for user/assistant entries
    #[serde(default)]
    pub message: Option<TranscriptMessage>,
    /// Set by Claude Code on synthetic assistant entries that carry an API error
    #[serde(rename = "isApiErrorMessage", default)]
    pub is_api_error: bool,
    /// Entry-level error code (e.g. "rate_limit"); only string values count
    #[serde(default)]
    pub error: Option<Value>,
}

/// Message payload of a user/assistant entry
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

/// Message content: plain text or a list of typed parts
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Other(Value),
}

/// A typed content part. Anything not recognized, including malformed
/// `tool_use`/`text` parts, becomes `Other`.
#[derive(Debug, Clone)]
pub enum ContentPart {
    ToolUse { name: String },
    Text { text: String },
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownPart {
    ToolUse { name: String },
    Text { text: String },
}

/// Decided per part so one odd element never discards its siblings
impl<'de> Deserialize<'de> for ContentPart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(match serde_json::from_value::<KnownPart>(raw) {
            Ok(KnownPart::ToolUse { name }) => ContentPart::ToolUse { name },
            Ok(KnownPart::Text { text }) => ContentPart::Text { text },
            Err(_) => ContentPart::Other,
        })
    }
}

impl TranscriptEntry {
    /// Role of the message, if any
    pub fn role(&self) -> Option<&str> {
        self.message.as_ref()?.role.as_deref()
    }

    /// Plain-text content (only for string content, not part lists)
    pub fn text_content(&self) -> Option<&str> {
        match self.message.as_ref()?.content.as_ref()? {
            MessageContent::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Typed parts (only for part-list content)
    pub fn parts(&self) -> Option<&[ContentPart]> {
        match self.message.as_ref()?.content.as_ref()? {
            MessageContent::Parts(parts) => Some(parts),
            _ => None,
        }
    }

    /// A user entry whose body is plain text (tool results are part lists)
    pub fn is_user_text(&self) -> bool {
        self.entry_type == "user" && self.text_content().is_some()
    }

    pub fn is_assistant(&self) -> bool {
        self.role() == Some("assistant")
    }

    /// Entry-level error string, if present and non-empty
    pub fn error_text(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Whether this entry reports an API failure rather than a reply
    pub fn is_error(&self) -> bool {
        self.is_api_error || self.error_text().is_some()
    }
}

/// One reconstructed request/response cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Episode {
    /// Text of the user message that triggered the work
    pub prompt: Option<String>,
    /// Assistant text written after the prompt
    pub response: Option<String>,
    /// Tool names in invocation order (duplicates kept)
    pub tools: Vec<String>,
    /// Milliseconds between the prompt and the last entry after it
    pub duration_ms: Option<u64>,
    /// API error reported by the final assistant entry
    pub error: Option<String>,
}
