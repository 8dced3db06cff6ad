//! Webhook delivery. Errors are logged, never propagated past [`deliver`].

use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use super::message::NotificationMessage;

/// Default bound for a webhook request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound notification channel
pub trait Notifier: Send + Sync {
    /// Short name for logs (must not leak secrets such as webhook tokens)
    fn name(&self) -> &str;

    /// Send one message
    fn send(&self, message: &NotificationMessage) -> Result<()>;
}

/// Posts messages as Discord-style embeds to a webhook URL
pub struct WebhookNotifier {
    url: String,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    fn send(&self, message: &NotificationMessage) -> Result<()> {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .build()
            .new_agent();
        // Non-2xx responses surface as errors
        agent
            .post(&self.url)
            .send_json(message.to_webhook_payload())?;
        Ok(())
    }
}

/// Fire-and-forget send. Returns whether delivery succeeded.
pub fn deliver(notifier: &dyn Notifier, message: &NotificationMessage) -> bool {
    match notifier.send(message) {
        Ok(()) => {
            info!("Sent \"{}\" via {}", message.title, notifier.name());
            true
        }
        Err(e) => {
            warn!(
                "Failed to send \"{}\" via {}: {:#}",
                message.title,
                notifier.name(),
                e
            );
            false
        }
    }
}
