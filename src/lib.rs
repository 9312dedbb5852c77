//! Cloud Music Bot - A Telegram bot that turns a song name into an audio file
//!
//! This library provides the request handling for the bot: routing inbound text,
//! searching and downloading a single track with yt-dlp, sending it back through
//! the Telegram Bot API and cleaning up the temporary file afterwards.

pub mod cli;
pub mod config;
pub mod context;
pub mod extractors;
pub mod router;
pub mod server;
pub mod telegram;
pub mod utils;
pub mod workflow;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use context::ServiceContext;
pub use extractors::{AudioCodec, ExtractionOptions, Extractor, RetrievedTrack};
pub use router::{MessageOutcome, Route, Sender};
pub use workflow::{DeliveryChannel, SearchAndDeliver, SearchRequest, WorkflowOutcome};

use std::path::{Path, PathBuf};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Reasons a search-and-deliver attempt can fail
#[derive(thiserror::Error, Debug)]
pub enum BotError {
    #[error("No match found for query: {0}")]
    NotFound(String),

    #[error("Network or extractor failure: {0}")]
    Network(String),

    /// `artifact` is the downloaded file conversion was working on, if known
    #[error("Audio conversion failed: {message}")]
    Transcode {
        message: String,
        artifact: Option<PathBuf>,
    },

    #[error("Failed to send audio: {0}")]
    Transmit(String),
}

impl BotError {
    /// Cause tag used for logging and for the workflow outcome
    pub fn cause(&self) -> FailureCause {
        match self {
            BotError::NotFound(_) => FailureCause::NotFound,
            BotError::Network(_) => FailureCause::Network,
            BotError::Transcode { .. } => FailureCause::Transcode,
            BotError::Transmit(_) => FailureCause::Transmit,
        }
    }

    /// File left on disk by the failed attempt
    pub fn artifact(&self) -> Option<&Path> {
        match self {
            BotError::Transcode { artifact, .. } => artifact.as_deref(),
            _ => None,
        }
    }
}

/// Coarse failure category of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    NotFound,
    Network,
    Transcode,
    Transmit,
}

impl FailureCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCause::NotFound => "not_found",
            FailureCause::Network => "network",
            FailureCause::Transcode => "transcode",
            FailureCause::Transmit => "transmit",
        }
    }
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
