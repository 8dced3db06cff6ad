//! Background collector that keeps a hidden Claude Code instance alive in tmux
//! and scrapes its `/usage` screen.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Local;
use tracing::{debug, info, warn};

use super::parser::{countdown_from, parse_usage_output};
use super::types::{CollectorOptions, QuotaSnapshot, ResetFormat};
use super::UsageError;
use crate::tmux::{TmuxClient, VirtualTerminal};

/// Default name of the background tmux session
pub const DEFAULT_SESSION: &str = "ccnotify-usage";

/// Text that shows the report has finished rendering
const RENDER_MARKER: &str = "Resets";

/// Owns the background usage session.
///
/// The session is created lazily on the first call and reused afterwards; it
/// is an OS-level tmux session, so it can also outlive this process when
/// [`shutdown`](Self::shutdown) is not called.
pub struct QuotaCollector<T: VirtualTerminal = TmuxClient> {
    terminal: T,
    /// tmux session name
    session: String,
    /// Program started in the session
    command: String,
    /// Working directory for the session (must be a folder `claude` already trusts)
    cwd: PathBuf,
    options: CollectorOptions,
}

impl<T: VirtualTerminal> QuotaCollector<T> {
    pub fn new(
        terminal: T,
        session: impl Into<String>,
        command: impl Into<String>,
        cwd: PathBuf,
        options: CollectorOptions,
    ) -> Self {
        Self {
            terminal,
            session: session.into(),
            command: command.into(),
            cwd,
            options,
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Current quota, or `None` when anything along the way fails or times out
    pub async fn snapshot(&self) -> Option<QuotaSnapshot> {
        match tokio::time::timeout(self.options.overall_timeout, self.try_snapshot()).await {
            Ok(Ok(snapshot)) => {
                info!(
                    "Usage fetch: {}% used ({})",
                    snapshot.percentage_used, snapshot.reset_description
                );
                Some(snapshot)
            }
            Ok(Err(e)) => {
                warn!("Usage fetch failed: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    "Usage fetch timed out after {:?}",
                    self.options.overall_timeout
                );
                None
            }
        }
    }

    /// Current quota, surfacing the failing step
    pub async fn try_snapshot(&self) -> Result<QuotaSnapshot, UsageError> {
        let screen = self.refresh_screen().await?;
        let mut snapshot = parse_usage_output(&screen).ok_or(UsageError::NotFound)?;

        if self.options.reset_format == ResetFormat::Countdown {
            if let Some(countdown) = countdown_from(&snapshot.reset_description, Local::now().time())
            {
                snapshot.reset_description = countdown;
            }
        }

        Ok(snapshot)
    }

    /// Kill the background session. A session that is already gone is not an error.
    pub async fn shutdown(&self) {
        match self.terminal.kill_session(&self.session).await {
            Ok(()) => info!("Usage fetch: killed session {}", self.session),
            Err(e) => debug!("Usage fetch: session cleanup skipped: {}", e),
        }
    }

    /// Bring `/usage` up to date on screen and capture it
    async fn refresh_screen(&self) -> Result<String, UsageError> {
        if self.terminal.has_session(&self.session).await? {
            debug!("Usage fetch: reusing session {}", self.session);
            self.dismiss_dialogs().await?;
        } else {
            self.start_session().await?;
        }

        self.show_usage().await?;
        self.wait_for_render().await
    }

    async fn start_session(&self) -> Result<(), UsageError> {
        self.terminal
            .new_session(&self.session, &self.cwd, &self.command)
            .await?;
        info!(
            "Usage fetch: started `{}` in session {}",
            self.command, self.session
        );
        tokio::time::sleep(self.options.startup_delay).await;
        Ok(())
    }

    /// Return to an empty prompt: close overlays, then clear the input line
    async fn dismiss_dialogs(&self) -> Result<(), UsageError> {
        for key in ["Escape", "Escape", "C-u"] {
            self.terminal.send_keys(&self.session, key).await?;
        }
        tokio::time::sleep(self.options.key_delay).await;
        Ok(())
    }

    /// Type `/usage` and run it.
    ///
    /// Escape closes the slash-command completion popup, which would otherwise
    /// swallow the Enter.
    async fn show_usage(&self) -> Result<(), UsageError> {
        self.terminal.send_literal(&self.session, "/usage").await?;
        tokio::time::sleep(self.options.key_delay).await;
        self.terminal.send_keys(&self.session, "Escape").await?;
        tokio::time::sleep(self.options.key_delay).await;
        self.terminal.send_keys(&self.session, "Enter").await?;
        Ok(())
    }

    /// Poll until the report is on screen; the last capture is returned either way
    async fn wait_for_render(&self) -> Result<String, UsageError> {
        let start = Instant::now();

        loop {
            tokio::time::sleep(self.options.poll_interval).await;
            let screen = self.terminal.capture_pane(&self.session).await?;

            if screen.contains(RENDER_MARKER) {
                debug!(
                    "Usage fetch: report rendered after {:.1}s",
                    start.elapsed().as_secs_f32()
                );
                return Ok(screen);
            }
            if start.elapsed() >= self.options.render_timeout {
                warn!("Usage fetch: timed out waiting for /usage output");
                return Ok(screen);
            }
        }
    }
}
