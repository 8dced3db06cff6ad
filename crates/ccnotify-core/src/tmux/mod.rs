//! tmux access for the background usage session.

mod client;

use std::time::Duration;

pub use client::{TmuxClient, VirtualTerminal};

/// Errors from a tmux invocation
#[derive(Debug, thiserror::Error)]
pub enum TmuxError {
    #[error("invalid tmux session name: {0}")]
    InvalidSession(String),
    #[error("failed to execute tmux {command}: {source}")]
    Spawn {
        command: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("tmux {command} timed out after {timeout:?}")]
    Timeout {
        command: &'static str,
        timeout: Duration,
    },
    #[error("tmux {command} failed: {stderr}")]
    Failed {
        command: &'static str,
        stderr: String,
    },
}
