//! HTTP surface: webhook endpoint, health/info endpoints and secret-gated
//! webhook management.

use crate::bot::dispatch::dispatch_update;
use crate::bot::{DenialCache, QuizSessions};
use crate::config::Settings;
use crate::llm::ChatClient;
use crate::quotes::QuoteClient;
use crate::stats::ServiceStats;
use crate::storage::JsonStore;
use crate::webhook;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::Update;
use tracing::{error, warn};

/// Header Telegram echoes back when a secret token was registered
const SECRET_TOKEN_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Shared state for HTTP handlers and the dispatch pipeline
#[derive(Clone)]
pub struct AppState {
    pub bot: Bot,
    pub settings: Arc<Settings>,
    pub store: Arc<JsonStore>,
    pub stats: Arc<ServiceStats>,
    pub quiz: Arc<QuizSessions>,
    pub denials: Arc<DenialCache>,
    pub llm: Option<Arc<ChatClient>>,
    pub quotes: Option<Arc<QuoteClient>>,
    /// Username commands may be addressed to (`/start@<username>`)
    pub bot_username: Arc<String>,
}

/// Build the service router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/healthz", get(healthz))
        .route("/webhook/:secret", post(receive_update))
        .route("/admin/set_webhook/:secret", post(admin_set_webhook))
        .route("/admin/delete_webhook/:secret", post(admin_delete_webhook))
        .route("/admin/get_webhook_info/:secret", get(admin_webhook_info))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn healthz() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "railbot",
        "time": Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    }))
}

async fn service_info(State(state): State<AppState>) -> Json<Value> {
    let counts = state.store.counts().await.unwrap_or_default();
    Json(json!({
        "service": "railbot",
        "stats": state.stats.snapshot(),
        "store": counts,
        "silenced_denials": state.denials.silenced_count(),
    }))
}

/// Webhook entry: 403 on secret mismatch, 400 on undecodable JSON,
/// 200 otherwise. Valid JSON that fails during handling still returns 200
/// to avoid Telegram retry storms; the failure is logged instead.
async fn receive_update(
    State(state): State<AppState>,
    Path(secret): Path<String>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    if !secret_matches(&state.settings, &secret, &headers) {
        warn!("Forbidden webhook access with mismatched secret");
        return (StatusCode::FORBIDDEN, "forbidden");
    }

    if let Err(e) = serde_json::from_str::<Value>(&body) {
        warn!("Rejected non-JSON webhook request: {e}");
        return (StatusCode::BAD_REQUEST, "bad request");
    }

    // Decode from the raw body rather than a `Value`: teloxide's custom
    // `Update` deserializer turns any update into `UpdateKind::Error` when
    // driven through `serde_json::from_value`.
    match serde_json::from_str::<Update>(&body) {
        Ok(update) => dispatch_update(&state, update).await,
        Err(e) => {
            // Unknown update shapes are Telegram's prerogative; ack anyway
            error!("Failed to decode update: {e}");
            state.stats.error();
        }
    }

    (StatusCode::OK, "OK")
}

fn secret_matches(settings: &Settings, path_secret: &str, headers: &HeaderMap) -> bool {
    if path_secret != settings.webhook_secret {
        return false;
    }
    match headers.get(SECRET_TOKEN_HEADER) {
        Some(token) => token
            .to_str()
            .is_ok_and(|t| t == settings.webhook_secret),
        // Header absent: path secret alone is accepted (pre-registration
        // requests and manual testing)
        None => true,
    }
}

async fn admin_set_webhook(
    State(state): State<AppState>,
    Path(secret): Path<String>,
) -> (StatusCode, Json<Value>) {
    if secret != state.settings.webhook_secret {
        return forbidden();
    }
    match webhook::set(&state.bot, &state.settings).await {
        Ok(url) => (StatusCode::OK, Json(json!({"result": true, "url": url}))),
        Err(e) => {
            error!("set_webhook failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"result": false, "error": e.to_string()})),
            )
        }
    }
}

async fn admin_delete_webhook(
    State(state): State<AppState>,
    Path(secret): Path<String>,
) -> (StatusCode, Json<Value>) {
    if secret != state.settings.webhook_secret {
        return forbidden();
    }
    match webhook::delete(&state.bot).await {
        Ok(()) => (StatusCode::OK, Json(json!({"result": true}))),
        Err(e) => {
            error!("delete_webhook failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"result": false, "error": e.to_string()})),
            )
        }
    }
}

async fn admin_webhook_info(
    State(state): State<AppState>,
    Path(secret): Path<String>,
) -> (StatusCode, Json<Value>) {
    if secret != state.settings.webhook_secret {
        return forbidden();
    }
    match webhook::info(&state.bot).await {
        Ok(info) => (StatusCode::OK, Json(json!({"result": info}))),
        Err(e) => {
            error!("get_webhook_info failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"result": null, "error": e.to_string()})),
            )
        }
    }
}

fn forbidden() -> (StatusCode, Json<Value>) {
    (StatusCode::FORBIDDEN, Json(json!({"error": "forbidden"})))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_secret(secret: &str) -> Settings {
        Settings {
            telegram_token: "dummy".to_string(),
            webhook_url: None,
            webhook_secret: secret.to_string(),
            auto_set_webhook: false,
            admin_users_str: None,
            host: "127.0.0.1".to_string(),
            port: 0,
            data_dir: "data".to_string(),
            alphavantage_api_key: None,
            openai_api_key: None,
        }
    }

    #[test]
    fn test_secret_matches_path_only() {
        let settings = settings_with_secret("s3cret");
        let headers = HeaderMap::new();
        assert!(secret_matches(&settings, "s3cret", &headers));
        assert!(!secret_matches(&settings, "wrong", &headers));
    }

    #[test]
    fn test_secret_header_must_agree_when_present() {
        let settings = settings_with_secret("s3cret");

        let mut headers = HeaderMap::new();
        headers.insert(SECRET_TOKEN_HEADER, "s3cret".parse().expect("header"));
        assert!(secret_matches(&settings, "s3cret", &headers));

        let mut headers = HeaderMap::new();
        headers.insert(SECRET_TOKEN_HEADER, "other".parse().expect("header"));
        assert!(!secret_matches(&settings, "s3cret", &headers));
    }
}
