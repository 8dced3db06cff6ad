//! Channel-agnostic notification message, rendered as a Discord-style embed.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Task finished successfully
pub const COLOR_SUCCESS: u32 = 0x00FF00;
/// Task failed
pub const COLOR_FAILURE: u32 = 0xFF0000;
/// Waiting on the operator
pub const COLOR_PENDING: u32 = 0xFFD700;

/// Maximum length of a field value accepted by the channel
const FIELD_VALUE_LIMIT: usize = 1024;

/// A named field of the message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// One outgoing notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationMessage {
    pub title: String,
    pub color: u32,
    pub fields: Vec<Field>,
    /// RFC 3339, UTC
    pub timestamp: String,
}

impl NotificationMessage {
    /// Create an empty message stamped with the current time
    pub fn new(title: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            color,
            fields: Vec::new(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Append a field (value is truncated to the channel limit)
    pub fn field(mut self, name: impl Into<String>, value: impl AsRef<str>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: clip(value.as_ref()),
            inline: false,
        });
        self
    }

    /// Value of the first field with this name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Webhook body: `{"embeds": [message]}`
    pub fn to_webhook_payload(&self) -> serde_json::Value {
        serde_json::json!({ "embeds": [self] })
    }
}

/// Empty values are rejected by the channel; long ones are cut with an ellipsis
fn clip(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return "-".to_string();
    }
    if value.chars().count() <= FIELD_VALUE_LIMIT {
        return value.to_string();
    }
    let mut clipped: String = value.chars().take(FIELD_VALUE_LIMIT - 1).collect();
    clipped.push('…');
    clipped
}
