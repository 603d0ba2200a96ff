//! Resilient messaging with automatic retry for Telegram API operations

use crate::config::TELEGRAM_MESSAGE_LIMIT;
use crate::utils;
use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message};

/// Send a message with automatic retry on transient network failures.
///
/// Text longer than the Telegram limit is truncated with a marker; the
/// retry policy is [`crate::utils::retry_telegram_operation`].
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
) -> Result<Message> {
    let text = text.into();
    let text = if text.chars().count() > TELEGRAM_MESSAGE_LIMIT {
        format!(
            "{}…\n\n(message truncated)",
            utils::truncate_str(&text, TELEGRAM_MESSAGE_LIMIT)
        )
    } else {
        text
    };

    utils::retry_telegram_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}
