//! Usage monitoring: fetch and parse Claude Code `/usage` output.
//!
//! A hidden Claude Code instance is kept running in a tmux session; each
//! request re-runs `/usage`, captures the screen, and parses the
//! "Current session" block.

pub mod fetcher;
pub mod parser;
pub mod types;

pub use fetcher::{QuotaCollector, DEFAULT_SESSION};
pub use parser::{countdown_from, parse_usage_output};
pub use types::{CollectorOptions, QuotaSnapshot, ResetFormat};

use crate::tmux::TmuxError;

/// Errors raised while collecting a quota snapshot
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error(transparent)]
    Terminal(#[from] TmuxError),
    #[error("no current-session usage found on screen")]
    NotFound,
}
