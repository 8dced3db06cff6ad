use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use ccnotify_core::usage::{CollectorOptions, ResetFormat, DEFAULT_SESSION};

/// Environment variables that override `webhook.url`, highest priority first
const WEBHOOK_ENV_VARS: [&str; 2] = ["CCNOTIFY_WEBHOOK_URL", "DISCORD_WEBHOOK_URL"];

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Claude Code hook notifier")]
pub struct Config {
    /// Enable debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand (defaults to `stop`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A task finished (Claude Code `Stop` hook)
    Stop,
    /// The assistant is waiting for input (Claude Code `Notification` hook)
    Notification,
    /// Print the current usage quota
    Usage,
    /// Register ccnotify hooks in Claude Code settings
    Install {
        /// Settings file to patch (default: ~/.claude/settings.json)
        #[arg(long)]
        settings: Option<PathBuf>,
    },
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Subcommand to run; hooks registered without one behave like `stop`
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Stop)
    }
}

impl Command {
    /// Hook commands never fail the calling process
    pub fn is_hook(&self) -> bool {
        matches!(self, Command::Stop | Command::Notification)
    }
}

/// Application settings (from config file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// How long to wait for the hook payload on stdin (milliseconds)
    #[serde(default = "default_stdin_timeout")]
    pub stdin_timeout_ms: u64,

    /// Webhook settings
    #[serde(default)]
    pub webhook: WebhookSettings,

    /// Usage quota settings
    #[serde(default)]
    pub usage: UsageSettings,
}

fn default_stdin_timeout() -> u64 {
    2000
}

/// Webhook delivery settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookSettings {
    /// Webhook URL; delivery is skipped when unset
    #[serde(default)]
    pub url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

fn default_webhook_timeout() -> u64 {
    5
}

/// Usage quota collection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSettings {
    /// Collect and report the usage quota
    #[serde(default = "default_usage_enabled")]
    pub enabled: bool,

    /// tmux session that hosts the background Claude Code instance
    #[serde(default = "default_session_name")]
    pub session_name: String,

    /// Program started in the session
    #[serde(default = "default_usage_command")]
    pub command: String,

    /// Leave the session running after exit so the next run can reuse it
    #[serde(default)]
    pub keep_session: bool,

    /// Report the reset time verbatim or as a countdown
    #[serde(default)]
    pub reset_format: ResetFormat,

    /// Wait after starting Claude Code (milliseconds)
    #[serde(default = "default_startup_delay")]
    pub startup_delay_ms: u64,

    /// Wait between keystrokes (milliseconds)
    #[serde(default = "default_key_delay")]
    pub key_delay_ms: u64,

    /// Interval between screen captures (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Maximum wait for the usage report to render (milliseconds)
    #[serde(default = "default_render_timeout")]
    pub render_timeout_ms: u64,

    /// Timeout for each tmux command (milliseconds)
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,

    /// Timeout for the whole quota collection (milliseconds)
    #[serde(default = "default_overall_timeout")]
    pub overall_timeout_ms: u64,
}

fn default_usage_enabled() -> bool {
    true
}

fn default_session_name() -> String {
    DEFAULT_SESSION.to_string()
}

fn default_usage_command() -> String {
    "claude".to_string()
}

fn default_startup_delay() -> u64 {
    5000
}

fn default_key_delay() -> u64 {
    500
}

fn default_poll_interval() -> u64 {
    500
}

fn default_render_timeout() -> u64 {
    10_000
}

fn default_command_timeout() -> u64 {
    5000
}

fn default_overall_timeout() -> u64 {
    30_000
}

impl Default for UsageSettings {
    fn default() -> Self {
        Self {
            enabled: default_usage_enabled(),
            session_name: default_session_name(),
            command: default_usage_command(),
            keep_session: false,
            reset_format: ResetFormat::default(),
            startup_delay_ms: default_startup_delay(),
            key_delay_ms: default_key_delay(),
            poll_interval_ms: default_poll_interval(),
            render_timeout_ms: default_render_timeout(),
            command_timeout_ms: default_command_timeout(),
            overall_timeout_ms: default_overall_timeout(),
        }
    }
}

impl UsageSettings {
    /// Collector timings derived from these settings
    pub fn collector_options(&self) -> CollectorOptions {
        CollectorOptions {
            startup_delay: Duration::from_millis(self.startup_delay_ms),
            key_delay: Duration::from_millis(self.key_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            render_timeout: Duration::from_millis(self.render_timeout_ms),
            overall_timeout: Duration::from_millis(self.overall_timeout_ms),
            reset_format: self.reset_format,
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stdin_timeout_ms: default_stdin_timeout(),
            webhook: WebhookSettings {
                url: None,
                timeout_secs: default_webhook_timeout(),
            },
            usage: UsageSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // Try custom path first
        if let Some(p) = path {
            if p.exists() {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {:?}", p))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", p));
            }
        }

        // Try default config locations
        let default_paths = [
            dirs::config_dir().map(|p| p.join("ccnotify/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/ccnotify/config.toml")),
            dirs::home_dir().map(|p| p.join(".ccnotify.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", path));
            }
        }

        // Return defaults if no config file found
        Ok(Self::default())
    }

    /// Merge environment overrides into settings (environment takes precedence)
    pub fn merge_env(&mut self) {
        let from_env = WEBHOOK_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty());
        if let Some(url) = from_env {
            self.webhook.url = Some(url.trim().to_string());
        }
    }

    /// Validate and normalize settings values
    ///
    /// Ensures polling has a floor and the overall quota timeout covers at
    /// least one startup-and-render cycle.
    pub fn validate(&mut self) {
        const MIN_POLL_INTERVAL: u64 = 50;

        if self.usage.poll_interval_ms < MIN_POLL_INTERVAL {
            self.usage.poll_interval_ms = MIN_POLL_INTERVAL;
        }
        let cycle = self
            .usage
            .startup_delay_ms
            .saturating_add(self.usage.render_timeout_ms);
        if self.usage.overall_timeout_ms < cycle {
            self.usage.overall_timeout_ms = cycle;
        }
        if self.webhook.timeout_secs == 0 {
            self.webhook.timeout_secs = default_webhook_timeout();
        }
        if let Some(url) = &self.webhook.url {
            if url.trim().is_empty() {
                self.webhook.url = None;
            }
        }
    }

    pub fn stdin_timeout(&self) -> Duration {
        Duration::from_millis(self.stdin_timeout_ms)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook.timeout_secs)
    }
}
