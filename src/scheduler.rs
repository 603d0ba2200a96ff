//! Background reminder loop
//!
//! Scans the task store on an interval and fires due reminders. A task is
//! marked done only after its reminder was delivered, so a failed send is
//! retried on the next scan.

use crate::bot::resilient::send_message_resilient;
use crate::config::REMINDER_POLL_SECS;
use crate::dna::MutationKind;
use crate::server::AppState;
use chrono::Utc;
use std::time::Duration;
use teloxide::types::ChatId;
use tracing::{error, info};

/// Run the reminder loop until the process shuts down
pub async fn run(state: AppState) {
    let mut interval = tokio::time::interval(Duration::from_secs(REMINDER_POLL_SECS));
    info!("Reminder scheduler running (every {REMINDER_POLL_SECS}s)");

    loop {
        interval.tick().await;
        scan_once(&state).await;
    }
}

/// One scheduler pass over the due tasks
pub async fn scan_once(state: &AppState) {
    let due = match state.store.due_tasks(Utc::now()).await {
        Ok(due) => due,
        Err(e) => {
            error!("Reminder scan failed to read tasks: {e}");
            return;
        }
    };

    for task in due {
        let text = format!("⏰ Reminder: {}", task.text);
        match send_message_resilient(&state.bot, ChatId(task.chat_id), text).await {
            Ok(_) => {
                state.stats.reply_sent();
                if let Err(e) = state.store.complete_task(task.id).await {
                    error!("Failed to mark task {} done: {e}", task.id);
                }
                if let Err(e) = state
                    .store
                    .modify_dna(|dna| dna.record_mutation(MutationKind::ReminderFired))
                    .await
                {
                    error!("Failed to record reminder mutation: {e}");
                }
                info!("Reminder {} delivered to chat {}", task.id, task.chat_id);
            }
            Err(e) => {
                // Leave the task pending; the next scan retries it
                error!("Reminder {} send failed: {e}", task.id);
                state.stats.error();
            }
        }
    }
}
