use std::future::Future;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

use super::TmuxError;

/// Regex pattern for validating tmux session names
static SESSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("Invalid SESSION_PATTERN regex"));

/// Validate a session name to prevent target/command injection
fn validate_session(name: &str) -> Result<(), TmuxError> {
    if !SESSION_PATTERN.is_match(name) {
        return Err(TmuxError::InvalidSession(name.to_string()));
    }
    Ok(())
}

/// A headless terminal that can host a long-running interactive program.
///
/// Implemented by [`TmuxClient`]; the quota collector only talks to this trait
/// so it can be exercised against an in-memory double.
pub trait VirtualTerminal: Send + Sync {
    /// Whether a session with this name is running
    fn has_session(&self, name: &str) -> impl Future<Output = Result<bool, TmuxError>> + Send;

    /// Start a detached session running `command` in `cwd`
    fn new_session(
        &self,
        name: &str,
        cwd: &Path,
        command: &str,
    ) -> impl Future<Output = Result<(), TmuxError>> + Send;

    /// Send a key (or key name such as `Enter`, `Escape`, `C-u`)
    fn send_keys(&self, name: &str, keys: &str) -> impl Future<Output = Result<(), TmuxError>> + Send;

    /// Type text literally
    fn send_literal(
        &self,
        name: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), TmuxError>> + Send;

    /// Visible screen contents as plain text
    fn capture_pane(&self, name: &str) -> impl Future<Output = Result<String, TmuxError>> + Send;

    /// Terminate the session
    fn kill_session(&self, name: &str) -> impl Future<Output = Result<(), TmuxError>> + Send;
}

/// Client for interacting with tmux
#[derive(Debug, Clone)]
pub struct TmuxClient {
    /// Upper bound for each tmux invocation
    timeout: Duration,
    /// Width of newly created sessions
    width: u16,
    /// Height of newly created sessions
    height: u16,
}

impl TmuxClient {
    /// Creates a new TmuxClient with default settings
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            width: 120,
            height: 50,
        }
    }

    /// Creates a new TmuxClient with a custom per-command timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::new()
        }
    }

    /// Run `tmux <subcommand> <args>` bounded by the client timeout
    async fn run(&self, subcommand: &'static str, args: &[&str]) -> Result<Output, TmuxError> {
        let child = Command::new("tmux")
            .arg(subcommand)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(TmuxError::Spawn {
                command: subcommand,
                source,
            }),
            Err(_) => Err(TmuxError::Timeout {
                command: subcommand,
                timeout: self.timeout,
            }),
        }
    }

    /// Like [`run`](Self::run) but treats a non-zero exit as an error
    async fn run_checked(
        &self,
        subcommand: &'static str,
        args: &[&str],
    ) -> Result<String, TmuxError> {
        let output = self.run(subcommand, args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TmuxError::Failed {
                command: subcommand,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualTerminal for TmuxClient {
    async fn has_session(&self, name: &str) -> Result<bool, TmuxError> {
        validate_session(name)?;
        // `=` forces an exact match instead of tmux's prefix matching
        let target = format!("={}", name);
        let output = self.run("has-session", &["-t", target.as_str()]).await?;
        Ok(output.status.success())
    }

    async fn new_session(&self, name: &str, cwd: &Path, command: &str) -> Result<(), TmuxError> {
        validate_session(name)?;
        let width = self.width.to_string();
        let height = self.height.to_string();
        let cwd = cwd.to_string_lossy().into_owned();
        self.run_checked(
            "new-session",
            &[
                "-d",
                "-s",
                name,
                "-x",
                width.as_str(),
                "-y",
                height.as_str(),
                "-c",
                cwd.as_str(),
                command,
            ],
        )
        .await?;
        Ok(())
    }

    async fn send_keys(&self, name: &str, keys: &str) -> Result<(), TmuxError> {
        validate_session(name)?;
        self.run_checked("send-keys", &["-t", name, keys]).await?;
        Ok(())
    }

    async fn send_literal(&self, name: &str, text: &str) -> Result<(), TmuxError> {
        validate_session(name)?;
        self.run_checked("send-keys", &["-t", name, "-l", text]).await?;
        Ok(())
    }

    async fn capture_pane(&self, name: &str) -> Result<String, TmuxError> {
        validate_session(name)?;
        self.run_checked("capture-pane", &["-p", "-t", name]).await
    }

    async fn kill_session(&self, name: &str) -> Result<(), TmuxError> {
        validate_session(name)?;
        let target = format!("={}", name);
        self.run_checked("kill-session", &["-t", target.as_str()]).await?;
        Ok(())
    }
}
