//! Telegram webhook management
//!
//! Registers, removes and inspects the bot's webhook. Registration always
//! best-effort deletes the previous webhook first, matching what the
//! service's operators expect from repeated deploys.

use crate::config::Settings;
use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::{info, warn};

/// Register the webhook as `{WEBHOOK_URL}/webhook/{WEBHOOK_SECRET}`.
///
/// Returns the registered URL.
///
/// # Errors
///
/// Fails when `WEBHOOK_URL` is unset, the URL does not parse, or the
/// Telegram API call fails.
pub async fn set(bot: &Bot, settings: &Settings) -> Result<String> {
    let url_str = settings
        .full_webhook_url()
        .ok_or_else(|| anyhow!("WEBHOOK_URL is not set"))?;
    let url = Url::parse(&url_str).context("invalid webhook URL")?;

    // Best-effort removal of any previous registration
    if let Err(e) = bot.delete_webhook().await {
        warn!("deleteWebhook before set failed (ignored): {e}");
    }

    bot.set_webhook(url)
        .secret_token(settings.webhook_secret.clone())
        .await
        .context("setWebhook failed")?;

    info!("Webhook registered");
    Ok(url_str)
}

/// Remove the webhook registration.
///
/// # Errors
///
/// Fails when the Telegram API call fails.
pub async fn delete(bot: &Bot) -> Result<()> {
    bot.delete_webhook()
        .drop_pending_updates(true)
        .await
        .context("deleteWebhook failed")?;
    info!("Webhook removed");
    Ok(())
}

/// Current webhook registration as reported by Telegram.
///
/// # Errors
///
/// Fails when the Telegram API call fails.
pub async fn info(bot: &Bot) -> Result<serde_json::Value> {
    let info = bot
        .get_webhook_info()
        .await
        .context("getWebhookInfo failed")?;

    Ok(serde_json::json!({
        "url": info.url.as_ref().map(Url::to_string),
        "pending_update_count": info.pending_update_count,
        "last_error_message": info.last_error_message,
        "has_custom_certificate": info.has_custom_certificate,
    }))
}

/// When enabled, register the webhook shortly after startup in the
/// background so a failure never blocks serving.
pub fn maybe_auto_register(bot: Bot, settings: Arc<Settings>) {
    if !settings.auto_set_webhook || settings.webhook_url.is_none() {
        return;
    }

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        match set(&bot, &settings).await {
            Ok(url) => info!("Auto-registered webhook at {url}"),
            Err(e) => warn!("Auto setWebhook failed, register manually: {e:#}"),
        }
    });
}
