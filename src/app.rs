//! Application glue: hook handling, quota report and hook registration.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use ccnotify_core::hook::{read_payload, HookPayload};
use ccnotify_core::notify::{deliver, format_quota, task_message, waiting_message};
use ccnotify_core::tmux::TmuxClient;
use ccnotify_core::transcript::{reconstruct, Episode};
use ccnotify_core::usage::{QuotaCollector, QuotaSnapshot};
use ccnotify_core::{NotificationMessage, WebhookNotifier};

use crate::config::{default_settings_path, register_hooks, Command, Settings};

/// Which notification a hook event produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// The assistant finished a task
    Task,
    /// The assistant is waiting for the operator
    Waiting,
}

pub struct App {
    settings: Settings,
    terminal: TmuxClient,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        let terminal = TmuxClient::with_timeout(settings.usage.command_timeout());
        Self { settings, terminal }
    }

    /// Run one command to completion
    ///
    /// Hook commands log every failure and return `Ok`, so Claude Code never
    /// sees a failing hook.
    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Stop => self.run_hook(HookKind::Task).await,
            Command::Notification => self.run_hook(HookKind::Waiting).await,
            Command::Usage => {
                let result = self.usage().await;
                self.finish().await;
                result
            }
            Command::Install { settings } => self.install(settings),
        }
    }

    /// Kill the background usage session regardless of `keep_session`
    pub async fn shutdown(&self) {
        self.collector().shutdown().await;
    }

    async fn run_hook(&self, kind: HookKind) -> Result<()> {
        if let Err(e) = self.handle_hook(kind, std::io::stdin()).await {
            warn!("Hook {:?} failed: {:#}", kind, e);
        }
        self.finish().await;
        Ok(())
    }

    async fn handle_hook<R>(&self, kind: HookKind, reader: R) -> Result<()>
    where
        R: Read + Send + 'static,
    {
        let payload = read_payload(reader, self.settings.stdin_timeout()).await;
        debug!(
            "Hook payload: event={:?} session={:?}",
            payload.hook_event_name, payload.session_id
        );
        let message = self.prepare(kind, &payload).await;
        self.dispatch(message).await
    }

    /// Reconstruct the episode and fetch the quota concurrently, then format
    async fn prepare(&self, kind: HookKind, payload: &HookPayload) -> NotificationMessage {
        let (episode, quota) = tokio::join!(load_episode(payload), self.quota());
        build_message(kind, payload, &episode, quota.as_ref())
    }

    async fn quota(&self) -> Option<QuotaSnapshot> {
        if !self.settings.usage.enabled {
            return None;
        }
        self.collector().snapshot().await
    }

    async fn dispatch(&self, message: NotificationMessage) -> Result<()> {
        let Some(url) = self.settings.webhook.url.clone() else {
            info!(
                "No webhook URL configured, not sending: {}",
                serde_json::to_string(&message)?
            );
            return Ok(());
        };

        let notifier = WebhookNotifier::with_timeout(url, self.settings.webhook_timeout());
        tokio::task::spawn_blocking(move || deliver(&notifier, &message))
            .await
            .context("Webhook task panicked")?;
        Ok(())
    }

    async fn usage(&self) -> Result<()> {
        let collector = self.collector();
        let snapshot = tokio::time::timeout(
            self.settings.usage.collector_options().overall_timeout,
            collector.try_snapshot(),
        )
        .await
        .context("Timed out collecting usage")??;
        println!("{}", format_quota(&snapshot));
        Ok(())
    }

    fn install(&self, settings_path: Option<PathBuf>) -> Result<()> {
        let path = match settings_path {
            Some(path) => path,
            None => default_settings_path().context("Could not determine home directory")?,
        };
        let exe = std::env::current_exe().context("Failed to locate ccnotify executable")?;
        let added = register_hooks(&path, &exe.to_string_lossy())?;

        if added.is_empty() {
            println!("Hooks already registered in {}", path.display());
        } else {
            println!("Registered {} hook(s) in {}", added.join(", "), path.display());
        }
        Ok(())
    }

    /// Normal-exit cleanup of the usage session
    async fn finish(&self) {
        if self.settings.usage.keep_session {
            debug!("Keeping usage session {}", self.settings.usage.session_name);
            return;
        }
        if self.settings.usage.enabled {
            self.shutdown().await;
        }
    }

    /// Collector bound to the configured session
    fn collector(&self) -> QuotaCollector {
        let usage = &self.settings.usage;
        QuotaCollector::new(
            self.terminal.clone(),
            usage.session_name.clone(),
            usage.command.clone(),
            session_cwd(),
            usage.collector_options(),
        )
    }
}

/// Where `claude` starts in a new usage session. The home directory is
/// already trusted by Claude Code, so no "trust this folder?" dialog appears.
fn session_cwd() -> PathBuf {
    dirs::home_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Episode for a payload: reconstructed from the transcript when one is
/// given, otherwise taken from the payload fields
async fn load_episode(payload: &HookPayload) -> Episode {
    let Some(path) = payload.transcript_path.clone() else {
        return payload.to_episode();
    };

    let mut episode = tokio::task::spawn_blocking(move || reconstruct(&path))
        .await
        .unwrap_or_else(|e| {
            warn!("Transcript task failed: {}", e);
            Episode::default()
        });
    merge_payload(&mut episode, payload);
    episode
}

/// Fill gaps in a reconstructed episode from explicit payload fields.
/// A payload error always wins.
fn merge_payload(episode: &mut Episode, payload: &HookPayload) {
    if episode.prompt.is_none() {
        episode.prompt = payload.prompt.clone();
    }
    if episode.tools.is_empty() {
        episode.tools = payload.tools.clone();
    }
    if episode.duration_ms.is_none() {
        episode.duration_ms = payload.duration;
    }
    if payload.error.is_some() {
        episode.error = payload.error.clone();
    }
}

fn build_message(
    kind: HookKind,
    payload: &HookPayload,
    episode: &Episode,
    quota: Option<&QuotaSnapshot>,
) -> NotificationMessage {
    match kind {
        HookKind::Task => task_message(episode, payload.status.as_deref(), quota),
        HookKind::Waiting => waiting_message(payload.message.as_deref(), episode, quota),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccnotify_core::notify::{COLOR_FAILURE, COLOR_PENDING, COLOR_SUCCESS};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn offline_settings() -> Settings {
        let mut settings = Settings::default();
        settings.usage.enabled = false;
        settings.webhook.url = None;
        settings
    }

    fn quota() -> QuotaSnapshot {
        QuotaSnapshot {
            percentage_used: 23,
            reset_description: "Resets 2:59pm (Asia/Tokyo)".to_string(),
        }
    }

    #[tokio::test]
    async fn test_task_completed_from_payload() {
        let app = App::new(offline_settings());
        let payload = HookPayload::parse(
            r#"{"prompt":"Test task","tools":["Read","Edit","Read"],"duration":2500,"status":"success"}"#,
        );

        let message = app.prepare(HookKind::Task, &payload).await;
        assert_eq!(message.title, "Task Completed");
        assert_eq!(message.color, COLOR_SUCCESS);
        assert_eq!(message.get("Prompt"), Some("Test task"));
        assert_eq!(message.get("Tools Used"), Some("Read (2), Edit (1)"));
        assert_eq!(message.get("Duration"), Some("2.5s"));
        assert_eq!(message.get("Usage"), None);
        assert_eq!(message.get("Error"), None);
    }

    #[tokio::test]
    async fn test_task_failed_from_payload() {
        let app = App::new(offline_settings());
        let payload = HookPayload::parse(r#"{"error":"boom"}"#);

        let message = app.prepare(HookKind::Task, &payload).await;
        assert_eq!(message.title, "Task Failed");
        assert_eq!(message.color, COLOR_FAILURE);
        assert_eq!(message.get("Prompt"), Some("No prompt provided"));
        assert_eq!(message.get("Tools Used"), Some("None"));
        assert_eq!(message.get("Duration"), Some("Unknown"));
        assert_eq!(message.get("Error"), Some("boom"));
    }

    #[tokio::test]
    async fn test_task_from_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"type":"user","timestamp":"2025-01-01T10:00:00.000Z","message":{"role":"user","content":"Fix the bug"}}"#,
                "\n",
                r#"{"type":"assistant","timestamp":"2025-01-01T10:00:03.000Z","message":{"role":"assistant","content":[{"type":"tool_use","name":"Read"},{"type":"text","text":"Done."}]}}"#,
                "\n",
            ),
        )
        .unwrap();

        let app = App::new(offline_settings());
        let payload = HookPayload {
            transcript_path: Some(path),
            ..Default::default()
        };

        let message = app.prepare(HookKind::Task, &payload).await;
        assert_eq!(message.title, "Task Completed");
        assert_eq!(message.get("Prompt"), Some("Fix the bug"));
        assert_eq!(message.get("Tools Used"), Some("Read (1)"));
        assert_eq!(message.get("Duration"), Some("3.0s"));
        assert_eq!(message.get("Response"), Some("Done."));
    }

    #[tokio::test]
    async fn test_missing_transcript_uses_placeholders() {
        let app = App::new(offline_settings());
        let payload = HookPayload {
            transcript_path: Some(PathBuf::from("/nonexistent/ccnotify/session.jsonl")),
            ..Default::default()
        };

        let message = app.prepare(HookKind::Task, &payload).await;
        assert_eq!(message.title, "Task Completed");
        assert_eq!(message.get("Prompt"), Some("No prompt provided"));
    }

    #[tokio::test]
    async fn test_waiting_message() {
        let app = App::new(offline_settings());
        let payload =
            HookPayload::parse(r#"{"message":"Claude needs your permission to use Bash"}"#);

        let message = app.prepare(HookKind::Waiting, &payload).await;
        assert_eq!(message.title, "Waiting for Input");
        assert_eq!(message.color, COLOR_PENDING);
        assert_eq!(
            message.get("Message"),
            Some("Claude needs your permission to use Bash")
        );
        assert_eq!(message.get("Prompt"), Some("No prompt provided"));
    }

    #[test]
    fn test_build_message_with_quota() {
        let episode = Episode {
            prompt: Some("Test task".to_string()),
            ..Default::default()
        };
        let message = build_message(
            HookKind::Task,
            &HookPayload::default(),
            &episode,
            Some(&quota()),
        );
        assert_eq!(
            message.get("Usage"),
            Some("23% used · Resets 2:59pm (Asia/Tokyo)")
        );
    }

    #[test]
    fn test_merge_payload() {
        let mut episode = Episode {
            prompt: Some("from transcript".to_string()),
            ..Default::default()
        };
        let payload = HookPayload {
            prompt: Some("from payload".to_string()),
            tools: vec!["Bash".to_string()],
            duration: Some(42),
            error: Some("boom".to_string()),
            ..Default::default()
        };

        merge_payload(&mut episode, &payload);
        assert_eq!(episode.prompt.as_deref(), Some("from transcript"));
        assert_eq!(episode.tools, vec!["Bash".to_string()]);
        assert_eq!(episode.duration_ms, Some(42));
        assert_eq!(episode.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_session_starts_in_home_directory() {
        let home = tempfile::tempdir().unwrap();
        temp_env::with_var("HOME", Some(home.path()), || {
            assert_eq!(session_cwd(), home.path());
        });
    }

    #[tokio::test]
    async fn test_handle_hook_without_webhook() {
        let app = App::new(offline_settings());
        let reader = Cursor::new(br#"{"prompt":"p","status":"success"}"#.to_vec());
        assert!(app.handle_hook(HookKind::Task, reader).await.is_ok());
    }

    #[tokio::test]
    async fn test_handle_hook_unreachable_webhook_is_ok() {
        let mut settings = offline_settings();
        settings.webhook.url = Some("http://127.0.0.1:9/webhook".to_string());
        let app = App::new(settings);
        assert!(app
            .handle_hook(HookKind::Waiting, Cursor::new(Vec::new()))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_install_into_custom_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let app = App::new(offline_settings());

        app.run(Command::Install {
            settings: Some(path.clone()),
        })
        .await
        .unwrap();

        let settings: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let command = settings["hooks"]["Stop"][0]["hooks"][0]["command"]
            .as_str()
            .unwrap();
        assert!(command.ends_with(" stop"));
    }
}
