//! Notification formatting and delivery.

pub mod format;
pub mod message;
pub mod webhook;

pub use format::{
    format_duration, format_quota, summarize_tools, task_message, waiting_message,
};
pub use message::{Field, NotificationMessage, COLOR_FAILURE, COLOR_PENDING, COLOR_SUCCESS};
pub use webhook::{deliver, Notifier, WebhookNotifier};
