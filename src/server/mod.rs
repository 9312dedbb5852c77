//! Webhook HTTP server and the worker draining its update queue.

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use teloxide::types::Update;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::context::ServiceContext;
use crate::telegram;

/// Header Telegram uses to echo the secret given to `setWebhook`
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    updates: mpsc::Sender<Update>,
    secret_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(updates: mpsc::Sender<Update>, secret_token: Option<String>) -> Self {
        Self {
            updates,
            secret_token: secret_token.map(Into::into),
        }
    }
}

/// Create the bounded queue between the webhook and the worker
pub fn update_queue(capacity: usize) -> (mpsc::Sender<Update>, mpsc::Receiver<Update>) {
    mpsc::channel(capacity)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/webhook", post(telegram_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home() -> Json<Value> {
    Json(json!({ "message": "Cloud Music Bot is running!" }))
}

/// Accept an update, queue it and acknowledge immediately.
///
/// Malformed bodies are acknowledged as well so Telegram does not keep
/// redelivering them.
async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(expected) = &state.secret_token {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_ref()) {
            tracing::warn!("Rejected webhook call with missing or wrong secret token");
            return (StatusCode::UNAUTHORIZED, Json(json!({ "ok": false }))).into_response();
        }
    }

    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => {
            tracing::debug!(update_id = update.id.0, "Queueing update");
            if state.updates.send(update).await.is_err() {
                tracing::warn!("Update queue is closed, dropping update");
            }
        }
        Err(e) => tracing::warn!("Discarding malformed update: {}", e),
    }

    Json(json!({ "ok": true })).into_response()
}

/// Drain the update queue, handling each update in its own task
pub async fn run_update_worker(ctx: Arc<ServiceContext>, mut updates: mpsc::Receiver<Update>) {
    while let Some(update) = updates.recv().await {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if let Some(outcome) = telegram::handle_update(&ctx, update).await {
                tracing::debug!(?outcome, "Update handled");
            }
        });
    }

    tracing::info!("Update queue closed, worker stopped");
}

/// Serve the webhook router until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
