//! Telegram Bot API side of the bot: outbound delivery and inbound update handling.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use teloxide::payloads::{SendAudioSetters, SetWebhookSetters};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, UpdateKind};

use crate::config::TelegramConfig;
use crate::context::ServiceContext;
use crate::router::{MessageOutcome, Sender};
use crate::utils;
use crate::workflow::DeliveryChannel;

/// Delivery channel backed by the Telegram Bot API
#[derive(Clone)]
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<()> {
        self.bot.send_message(chat, text).await?;
        Ok(())
    }

    async fn send_upload_presence(&self, chat: ChatId) -> Result<()> {
        self.bot.send_chat_action(chat, ChatAction::UploadVoice).await?;
        Ok(())
    }

    async fn send_audio(&self, chat: ChatId, path: &Path, title: &str) -> Result<()> {
        self.bot
            .send_audio(chat, InputFile::file(path.to_path_buf()))
            .title(title)
            .await?;
        Ok(())
    }
}

/// Register `<base_url>/webhook` with Telegram
pub async fn register_webhook(bot: &Bot, config: &TelegramConfig) -> Result<()> {
    let Some(base_url) = config.base_url.as_deref() else {
        tracing::info!("No base URL configured, skipping webhook registration");
        return Ok(());
    };

    let endpoint = utils::webhook_endpoint(base_url)?;
    tracing::info!("Registering webhook: {}", endpoint);

    let mut request = bot.set_webhook(endpoint);
    if let Some(secret) = &config.webhook_secret {
        request = request.secret_token(secret.clone());
    }

    request.await.context("Failed to register webhook with Telegram")?;
    Ok(())
}

/// Pull chat, sender and text out of a message; `None` for non-text messages
pub fn message_parts(message: &Message) -> Option<(ChatId, Sender, &str)> {
    let text = message.text()?;

    let sender = match message.from.as_ref() {
        Some(user) => Sender::from(user),
        None => Sender {
            username: message.chat.username().map(str::to_string),
            first_name: message.chat.first_name().unwrap_or("there").to_string(),
        },
    };

    Some((message.chat.id, sender, text))
}

/// Handle one update taken off the webhook queue
pub async fn handle_update(ctx: &ServiceContext, update: Update) -> Option<MessageOutcome> {
    let UpdateKind::Message(message) = update.kind else {
        tracing::debug!("Ignoring non-message update");
        return None;
    };

    let Some((chat, sender, text)) = message_parts(&message) else {
        tracing::debug!(chat_id = message.chat.id.0, "Ignoring message without text");
        return None;
    };

    Some(ctx.handle_message(chat, &sender, text).await)
}
