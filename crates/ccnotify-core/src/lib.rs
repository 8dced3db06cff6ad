//! Core library for ccnotify.
//!
//! Reconstructs the last request/response episode from a Claude Code
//! transcript, scrapes the `/usage` quota screen through a background tmux
//! session, and turns both into a webhook notification.

pub mod hook;
pub mod notify;
pub mod tmux;
pub mod transcript;
pub mod usage;

pub use hook::HookPayload;
pub use notify::{NotificationMessage, Notifier, WebhookNotifier};
pub use transcript::{reconstruct, Episode};
pub use usage::{QuotaCollector, QuotaSnapshot};
