//! Update pipeline: record, parse, route
//!
//! Updates arrive from the webhook endpoint, so routing is one flat
//! function instead of a long-poll dispatcher tree. Handler failures are
//! logged and absorbed here; the HTTP layer never sees them.

use crate::bot::commands::Command;
use crate::bot::handlers;
use crate::dna::MutationKind;
use crate::server::AppState;
use crate::storage::{MessageRecord, UserSeen};
use anyhow::Result;
use chrono::Utc;
use teloxide::types::{Message, Update, UpdateKind};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error};

/// Entry point for one Telegram update
pub async fn dispatch_update(state: &AppState, update: Update) {
    state.stats.update_received();

    let update_id = i64::from(update.id.0);
    let UpdateKind::Message(msg) = update.kind else {
        debug!("Ignoring non-message update {update_id}");
        return;
    };

    if let Err(e) = record_update(state, update_id, &msg).await {
        // Bookkeeping failures must not block the reply
        error!("Failed to record update {update_id}: {e}");
    }

    if let Err(e) = route_message(state, &msg).await {
        error!("Handler error for update {update_id}: {e}");
        state.stats.error();
        handlers::record_dna(state, MutationKind::Error).await;
    }
}

/// Upsert the sender and append the message snapshot
async fn record_update(state: &AppState, update_id: i64, msg: &Message) -> Result<()> {
    if let Some(user) = msg.from.as_ref() {
        let user_id = user.id.0.cast_signed();
        let seen = UserSeen {
            id: user_id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        };
        state
            .store
            .record_user(&seen, state.settings.is_admin(user_id))
            .await?;
    }

    state
        .store
        .append_message(MessageRecord {
            update_id,
            chat_id: msg.chat.id.0,
            user_id: handlers::user_id_of(msg),
            text: msg.text().map(ToString::to_string),
            timestamp: Utc::now(),
        })
        .await?;

    Ok(())
}

async fn route_message(state: &AppState, msg: &Message) -> Result<()> {
    let Some(text) = msg.text() else {
        return handlers::handle_non_text(state, msg).await;
    };

    if let Ok(cmd) = Command::parse(text, state.bot_username.as_str()) {
        debug!("Handling {cmd:?} from user {}", handlers::user_id_of(msg));
        handlers::handle_command(state, msg, cmd).await?;
        state.stats.command_handled();
        handlers::record_dna(state, MutationKind::Command).await;
        return Ok(());
    }

    handlers::handle_plain_text(state, msg, text).await
}
