//! Command routing for inbound text messages.

use teloxide::types::{ChatId, User};

use crate::context::ServiceContext;
use crate::workflow::{SearchRequest, WorkflowOutcome};

/// Prompt sent when the message has no song name in it
pub const EMPTY_QUERY_PROMPT: &str = "Please type a song name to search!";

/// The parts of a Telegram user the router needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub username: Option<String>,
    pub first_name: String,
}

impl From<&User> for Sender {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            first_name: user.first_name.clone(),
        }
    }
}

/// What an inbound text asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/start`, optionally addressed to the bot (`/start@name`)
    Start,

    /// Free text to search for, already trimmed
    Search(String),

    /// Whitespace-only text
    EmptyQuery,

    /// Any other slash command, ignored
    Command(String),
}

/// What handling a message amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Greeted,
    Prompted,
    Ignored,
    Searched(WorkflowOutcome),
}

/// Classify an inbound text message
pub fn route(text: &str) -> Route {
    let text = text.trim();

    if text.is_empty() {
        return Route::EmptyQuery;
    }

    // Telegram only marks `/name` as a command when the name follows the slash directly
    let command = text
        .strip_prefix('/')
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_'));

    if let Some(command) = command {
        let name = command
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default()
            .to_lowercase();

        return match name.as_str() {
            "start" => Route::Start,
            _ => Route::Command(name),
        };
    }

    Route::Search(text.to_string())
}

/// Welcome message, addressed by username or first name
pub fn greeting(sender: &Sender) -> String {
    match sender.username.as_deref().filter(|u| !u.is_empty()) {
        Some(username) => format!("Hello @{}! Welcome to Cloud Music 🎵", username),
        None => format!("Hello {}! Welcome to Cloud Music 🎵", sender.first_name),
    }
}

/// Handle one inbound text message from `chat`
pub async fn dispatch(
    ctx: &ServiceContext,
    chat: ChatId,
    sender: &Sender,
    text: &str,
) -> MessageOutcome {
    match route(text) {
        Route::Start => {
            tracing::info!(chat_id = chat.0, "Greeting new user");
            if let Err(e) = ctx.channel().send_text(chat, &greeting(sender)).await {
                tracing::warn!("Could not send greeting: {:#}", e);
            }
            MessageOutcome::Greeted
        }
        Route::EmptyQuery => {
            if let Err(e) = ctx.channel().send_text(chat, EMPTY_QUERY_PROMPT).await {
                tracing::warn!("Could not send prompt: {:#}", e);
            }
            MessageOutcome::Prompted
        }
        Route::Command(name) => {
            tracing::debug!("Ignoring unknown command /{}", name);
            MessageOutcome::Ignored
        }
        Route::Search(query) => match SearchRequest::new(&query, chat) {
            Some(request) => MessageOutcome::Searched(ctx.workflow().run(&request).await),
            None => MessageOutcome::Prompted,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::extractors::MockExtractor;
    use crate::workflow::MockDeliveryChannel;
    use std::sync::Arc;

    const CHAT: ChatId = ChatId(7);

    fn sender(username: Option<&str>) -> Sender {
        Sender {
            username: username.map(str::to_string),
            first_name: "Dana".to_string(),
        }
    }

    fn context(
        extractor: MockExtractor,
        channel: MockDeliveryChannel,
    ) -> (tempfile::TempDir, ServiceContext) {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.telegram.bot_token = "test-token".to_string();
        config.download.dir = tmp.path().join("downloads");

        let ctx = ServiceContext::new(config, Arc::new(extractor), Arc::new(channel)).unwrap();
        (tmp, ctx)
    }

    #[test]
    fn test_route_start() {
        assert_eq!(route("/start"), Route::Start);
        assert_eq!(route("  /start  "), Route::Start);
        assert_eq!(route("/start@CloudMusicBot"), Route::Start);
        assert_eq!(route("/START payload"), Route::Start);
    }

    #[test]
    fn test_route_other_commands() {
        assert_eq!(route("/help"), Route::Command("help".to_string()));
        assert_eq!(route("/Help@CloudMusicBot now"), Route::Command("help".to_string()));
    }

    #[test]
    fn test_route_bare_slash_is_search() {
        assert_eq!(route("/"), Route::Search("/".to_string()));
        assert_eq!(route("/ foo"), Route::Search("/ foo".to_string()));
        assert_eq!(route(" // lofi "), Route::Search("// lofi".to_string()));
    }

    #[test]
    fn test_route_search_and_empty() {
        assert_eq!(
            route("  imagine dragons believer "),
            Route::Search("imagine dragons believer".to_string())
        );
        assert_eq!(route(""), Route::EmptyQuery);
        assert_eq!(route("   \n\t"), Route::EmptyQuery);
    }

    #[test]
    fn test_greeting_prefers_username() {
        let text = greeting(&sender(Some("dana_k")));
        assert!(text.contains("@dana_k"));
        assert!(!text.contains("Dana!"));
    }

    #[test]
    fn test_greeting_falls_back_to_first_name() {
        assert!(greeting(&sender(None)).contains("Dana"));
        assert!(greeting(&sender(Some(""))).contains("Dana"));
    }

    #[tokio::test]
    async fn test_empty_query_prompts_once_without_search() {
        let mut extractor = MockExtractor::new();
        extractor.expect_retrieve().times(0);

        let mut channel = MockDeliveryChannel::new();
        channel
            .expect_send_text()
            .withf(|chat, text| *chat == CHAT && text.to_string() == EMPTY_QUERY_PROMPT)
            .times(1)
            .returning(|_, _| Ok(()));
        channel.expect_send_upload_presence().times(0);
        channel.expect_send_audio().times(0);

        let (_tmp, ctx) = context(extractor, channel);

        let outcome = dispatch(&ctx, CHAT, &sender(None), "  \t ").await;
        assert_eq!(outcome, MessageOutcome::Prompted);
    }

    #[tokio::test]
    async fn test_text_runs_search() {
        let mut extractor = MockExtractor::new();
        extractor
            .expect_retrieve()
            .withf(|query, _| query.to_string() == "zzz_no_such_song_zzz")
            .times(1)
            .returning(|query, _| Err(crate::BotError::NotFound(query.to_string())));
        extractor.expect_name().return_const("mock");

        let mut channel = MockDeliveryChannel::new();
        channel
            .expect_send_text()
            .times(2)
            .returning(|_, _| Ok(()));
        channel
            .expect_send_upload_presence()
            .times(1)
            .returning(|_| Ok(()));
        channel.expect_send_audio().times(0);

        let (_tmp, ctx) = context(extractor, channel);

        let outcome = dispatch(&ctx, CHAT, &sender(None), " zzz_no_such_song_zzz ").await;
        assert_eq!(
            outcome,
            MessageOutcome::Searched(WorkflowOutcome::Failed {
                cause: crate::FailureCause::NotFound
            })
        );
    }

    #[tokio::test]
    async fn test_start_sends_greeting() {
        let mut extractor = MockExtractor::new();
        extractor.expect_retrieve().times(0);

        let mut channel = MockDeliveryChannel::new();
        channel
            .expect_send_text()
            .withf(|_, text| text.contains("@dana_k"))
            .times(1)
            .returning(|_, _| Ok(()));

        let (_tmp, ctx) = context(extractor, channel);

        let outcome = dispatch(&ctx, CHAT, &sender(Some("dana_k")), "/start").await;
        assert_eq!(outcome, MessageOutcome::Greeted);
    }

    #[tokio::test]
    async fn test_unknown_command_is_ignored() {
        let mut extractor = MockExtractor::new();
        extractor.expect_retrieve().times(0);

        let mut channel = MockDeliveryChannel::new();
        channel.expect_send_text().times(0);

        let (_tmp, ctx) = context(extractor, channel);

        let outcome = dispatch(&ctx, CHAT, &sender(None), "/settings").await;
        assert_eq!(outcome, MessageOutcome::Ignored);
    }
}
