//! Transcript reconstruction: recover the latest prompt, tool use, reply and
//! duration from a Claude Code session transcript.

pub mod reconstruct;
pub mod types;

use std::path::PathBuf;

pub use reconstruct::{reconstruct, reconstruct_from_str, try_reconstruct};
pub use types::{ContentPart, Episode, MessageContent, TranscriptEntry, TranscriptMessage};

/// Errors raised while reading a transcript
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
