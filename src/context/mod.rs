use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::types::ChatId;

use crate::config::Config;
use crate::extractors::{ExtractionOptions, Extractor};
use crate::router::{self, MessageOutcome, Sender};
use crate::workflow::{DeliveryChannel, SearchAndDeliver};

/// Process-wide state shared by every request handler
pub struct ServiceContext {
    config: Config,
    options: ExtractionOptions,
    extractor: Arc<dyn Extractor>,
    channel: Arc<dyn DeliveryChannel>,
}

impl ServiceContext {
    /// Build the context and make sure the download directory exists
    pub fn new(
        config: Config,
        extractor: Arc<dyn Extractor>,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Result<Self> {
        fs_err::create_dir_all(&config.download.dir)
            .context("Failed to create download directory")?;

        let options = ExtractionOptions::from_config(&config.download);

        Ok(Self {
            config,
            options,
            extractor,
            channel,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    pub fn channel(&self) -> &dyn DeliveryChannel {
        self.channel.as_ref()
    }

    pub fn workflow(&self) -> SearchAndDeliver<'_> {
        SearchAndDeliver::new(self.extractor.as_ref(), self.channel.as_ref(), &self.options)
    }

    /// Route and handle one inbound text message
    pub async fn handle_message(&self, chat: ChatId, sender: &Sender, text: &str) -> MessageOutcome {
        router::dispatch(self, chat, sender, text).await
    }
}
