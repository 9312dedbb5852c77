//! Search-and-deliver workflow.
//!
//! One run takes a query from a chat, fetches the best single match through an
//! [`Extractor`], sends the converted file back through a [`DeliveryChannel`]
//! and removes the file from local storage whether or not sending worked.

use async_trait::async_trait;
use std::path::Path;
use teloxide::types::ChatId;
use tracing::Instrument;
use uuid::Uuid;

use crate::extractors::{normalize_extension, ExtractionOptions, Extractor};
use crate::utils;
use crate::{BotError, FailureCause, Result};

/// Reply sent for every retrieval or delivery failure
pub const APOLOGY: &str = "❌ Sorry, could not find or download the song.";

/// Outbound side of the messaging platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Send a plain text reply
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<()>;

    /// Show the "uploading audio" indicator
    async fn send_upload_presence(&self, chat: ChatId) -> Result<()>;

    /// Send a local file as an audio attachment
    async fn send_audio(&self, chat: ChatId, path: &Path, title: &str) -> Result<()>;
}

/// A validated search query from one chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    query: String,
    chat: ChatId,
}

impl SearchRequest {
    /// Returns `None` when the query is empty after trimming
    pub fn new(query: &str, chat: ChatId) -> Option<Self> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        Some(Self {
            query: query.to_string(),
            chat,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn chat(&self) -> ChatId {
        self.chat
    }
}

/// Result of one workflow run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Delivered { title: String },
    Failed { cause: FailureCause },
}

impl WorkflowOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, WorkflowOutcome::Delivered { .. })
    }
}

pub fn searching_message(query: &str) -> String {
    format!("🔎 Searching for '{}'...", query)
}

/// The search → download → convert → send → cleanup sequence
pub struct SearchAndDeliver<'a> {
    extractor: &'a dyn Extractor,
    channel: &'a dyn DeliveryChannel,
    options: &'a ExtractionOptions,
}

impl<'a> SearchAndDeliver<'a> {
    pub fn new(
        extractor: &'a dyn Extractor,
        channel: &'a dyn DeliveryChannel,
        options: &'a ExtractionOptions,
    ) -> Self {
        Self {
            extractor,
            channel,
            options,
        }
    }

    /// Run the workflow for one request. Never fails; failures are reported to
    /// the chat and returned as [`WorkflowOutcome::Failed`].
    pub async fn run(&self, request: &SearchRequest) -> WorkflowOutcome {
        let span = tracing::info_span!(
            "search",
            request_id = %Uuid::new_v4(),
            chat_id = request.chat().0
        );

        self.run_in_span(request).instrument(span).await
    }

    async fn run_in_span(&self, request: &SearchRequest) -> WorkflowOutcome {
        tracing::info!("Searching for: {}", utils::truncate(request.query(), 80));
        self.acknowledge(request).await;

        match self.fetch_and_send(request).await {
            Ok(title) => {
                tracing::info!("Delivered track: {}", title);
                WorkflowOutcome::Delivered { title }
            }
            Err(err) => {
                let cause = err.cause();
                tracing::warn!(cause = %cause, "Search failed: {}", err);

                if let Err(e) = self.channel.send_text(request.chat(), APOLOGY).await {
                    tracing::warn!("Could not send failure notice: {:#}", e);
                }

                WorkflowOutcome::Failed { cause }
            }
        }
    }

    /// Best-effort status message and presence indicator
    async fn acknowledge(&self, request: &SearchRequest) {
        let chat = request.chat();

        if let Err(e) = self.channel.send_text(chat, &searching_message(request.query())).await {
            tracing::warn!("Could not send search acknowledgment: {:#}", e);
        }
        if let Err(e) = self.channel.send_upload_presence(chat).await {
            tracing::debug!("Could not send upload indicator: {:#}", e);
        }
    }

    async fn fetch_and_send(&self, request: &SearchRequest) -> std::result::Result<String, BotError> {
        tracing::debug!("Retrieving with {}", self.extractor.name());
        let track = match self.extractor.retrieve(request.query(), self.options).await {
            Ok(track) => track,
            Err(err) => {
                if let Some(artifact) = err.artifact() {
                    self.remove_track_files(artifact).await;
                }
                return Err(err);
            }
        };

        let delivery_path = normalize_extension(&track.path, self.options.post_processor.codec);
        if let Ok(metadata) = fs_err::tokio::metadata(&delivery_path).await {
            tracing::debug!(
                "Sending {} ({})",
                delivery_path.display(),
                utils::format_file_size(metadata.len())
            );
        }

        let sent = self
            .channel
            .send_audio(request.chat(), &delivery_path, &track.title)
            .await
            .map_err(|e| BotError::Transmit(format!("{:#}", e)));

        self.remove_track_files(&track.path).await;

        sent.map(|_| track.title)
    }

    /// Remove the converted file and the reported download, if they differ
    async fn remove_track_files(&self, reported: &Path) {
        let converted = normalize_extension(reported, self.options.post_processor.codec);
        remove_artifact(&converted).await;
        if converted != reported {
            remove_artifact(reported).await;
        }
    }
}

/// Delete a temporary file, tolerating its absence
async fn remove_artifact(path: &Path) {
    match fs_err::tokio::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove temporary file: {}", e),
    }
}
