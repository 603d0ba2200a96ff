//! Command and message handlers

use crate::bot::commands::{parse_remind, Command};
use crate::bot::resilient::send_message_resilient;
use crate::dna::MutationKind;
use crate::quotes::QuoteError;
use crate::server::AppState;
use crate::storage::TaskRecord;
use anyhow::Result;
use chrono::{Duration, Utc};
use teloxide::types::{ChatId, Message};
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

/// Route a parsed command to its handler
///
/// # Errors
///
/// Returns an error if the handler or the reply fails.
pub async fn handle_command(state: &AppState, msg: &Message, cmd: Command) -> Result<()> {
    match cmd {
        Command::Start => start(state, msg).await,
        Command::Help => help(state, msg).await,
        Command::Id => id(state, msg).await,
        Command::Stats => stats(state, msg).await,
        Command::Stock(args) => stock(state, msg, &args).await,
        Command::Quiz => quiz(state, msg).await,
        Command::Score => score(state, msg).await,
        Command::Remind(args) => remind(state, msg, &args).await,
        Command::Tasks => tasks(state, msg).await,
        Command::Dna => dna(state, msg).await,
        Command::Ask(args) => ask(state, msg, &args).await,
        Command::Broadcast(args) => broadcast(state, msg, &args).await,
        Command::Users => users(state, msg).await,
    }
}

/// Reply to plain (non-command) text: open quiz answer first, then the
/// assistant when configured, else the echo reply.
///
/// # Errors
///
/// Returns an error if a reply fails to send.
pub async fn handle_plain_text(state: &AppState, msg: &Message, text: &str) -> Result<()> {
    let chat_id = msg.chat.id;

    if let Some(correct) = state.quiz.check_answer(chat_id.0, text).await {
        let user_id = user_id_of(msg);
        let name = first_name_of(msg);
        let score = state
            .store
            .record_quiz_answer(user_id, &name, correct)
            .await?;

        let kind = if correct {
            MutationKind::QuizCorrect
        } else {
            MutationKind::QuizWrong
        };
        record_dna(state, kind).await;

        let reply = if correct {
            format!("✅ Correct! Your score: {}/{}", score.correct, score.asked)
        } else {
            format!("❌ Not quite. Your score: {}/{}", score.correct, score.asked)
        };
        return reply_text(state, chat_id, reply).await;
    }

    if let Some(llm) = &state.llm {
        match llm.reply(text).await {
            Ok(answer) => {
                record_dna(state, MutationKind::ChatReply).await;
                return reply_text(state, chat_id, answer).await;
            }
            Err(e) => {
                warn!("Chat completion failed, falling back to echo: {e}");
            }
        }
    }

    record_dna(state, MutationKind::ChatReply).await;
    reply_text(state, chat_id, format!("Got it: {text}")).await
}

/// Reply to updates without text (stickers, photos, etc.)
///
/// # Errors
///
/// Returns an error if the reply fails to send.
pub async fn handle_non_text(state: &AppState, msg: &Message) -> Result<()> {
    reply_text(state, msg.chat.id, "Got your message, thanks!").await
}

async fn start(state: &AppState, msg: &Message) -> Result<()> {
    let name = first_name_of(msg);
    let text = format!(
        "Hi {name}! I'm railbot.\n\
         I log messages, quote stocks, run quizzes and set reminders.\n\
         Send /help for the full command list."
    );
    reply_text(state, msg.chat.id, text).await
}

async fn help(state: &AppState, msg: &Message) -> Result<()> {
    reply_text(state, msg.chat.id, Command::descriptions().to_string()).await
}

async fn id(state: &AppState, msg: &Message) -> Result<()> {
    let user = msg.from.as_ref();
    let text = format!(
        "User ID: {}\nChat ID: {}\nUsername: {}",
        user.map_or_else(|| "unknown".to_string(), |u| u.id.to_string()),
        msg.chat.id,
        user.and_then(|u| u.username.as_deref())
            .unwrap_or("(none)"),
    );
    reply_text(state, msg.chat.id, text).await
}

async fn stats(state: &AppState, msg: &Message) -> Result<()> {
    let counts = state.store.counts().await?;
    let snap = state.stats.snapshot();
    let dna = state.store.dna().await?;

    let text = format!(
        "📊 Service stats\n\
         Users: {}\nMessage log: {}\nPending tasks: {}\nQuiz players: {}\n\
         Updates received: {}\nCommands handled: {}\nReplies sent: {}\nErrors: {}\n\
         Uptime: {}s\nDNA generation: {}",
        counts.users,
        counts.messages,
        counts.pending_tasks,
        counts.quiz_players,
        snap.updates_received,
        snap.commands_handled,
        snap.replies_sent,
        snap.errors,
        snap.uptime_secs,
        dna.generation,
    );
    reply_text(state, msg.chat.id, text).await
}

async fn stock(state: &AppState, msg: &Message, args: &str) -> Result<()> {
    let symbol = args.trim();
    if symbol.is_empty() {
        return reply_text(state, msg.chat.id, "Usage: /stock <SYMBOL>, e.g. /stock IBM").await;
    }

    let Some(quotes) = &state.quotes else {
        return reply_text(
            state,
            msg.chat.id,
            "Stock quotes are not configured (missing ALPHAVANTAGE_API_KEY).",
        )
        .await;
    };

    let reply = match quotes.global_quote(symbol).await {
        Ok(quote) => quote.render(),
        Err(QuoteError::UnknownSymbol(s)) => format!("Unknown symbol: {s}"),
        Err(QuoteError::RateLimited(_)) => {
            "Quote provider rate limit hit, try again in a minute.".to_string()
        }
        Err(e) => {
            warn!("Quote lookup failed for {symbol}: {e}");
            "Could not fetch that quote right now.".to_string()
        }
    };
    reply_text(state, msg.chat.id, reply).await
}

async fn quiz(state: &AppState, msg: &Message) -> Result<()> {
    let question = state.quiz.open_question(msg.chat.id.0).await;
    reply_text(state, msg.chat.id, format!("❓ {}", question.text)).await
}

async fn score(state: &AppState, msg: &Message) -> Result<()> {
    let scores = state.store.quiz_scores().await?;
    if scores.is_empty() {
        return reply_text(state, msg.chat.id, "No quiz answers yet. Try /quiz!").await;
    }

    let mut text = String::from("🏆 Quiz scoreboard\n");
    for (rank, entry) in scores.iter().take(10).enumerate() {
        text.push_str(&format!(
            "{}. {} — {}/{}\n",
            rank + 1,
            entry.name,
            entry.correct,
            entry.asked
        ));
    }
    reply_text(state, msg.chat.id, text).await
}

async fn remind(state: &AppState, msg: &Message, args: &str) -> Result<()> {
    let Some((minutes, text)) = parse_remind(args) else {
        return reply_text(
            state,
            msg.chat.id,
            "Usage: /remind <minutes> <text>, e.g. /remind 15 drink water",
        )
        .await;
    };

    let now = Utc::now();
    let task = TaskRecord {
        id: uuid::Uuid::new_v4(),
        chat_id: msg.chat.id.0,
        user_id: user_id_of(msg),
        text,
        due: now + Duration::minutes(minutes),
        created_at: now,
        done: false,
    };
    let due = task.due;
    state.store.add_task(task).await?;

    reply_text(
        state,
        msg.chat.id,
        format!("⏰ Reminder set for {}", due.format("%H:%M UTC")),
    )
    .await
}

async fn tasks(state: &AppState, msg: &Message) -> Result<()> {
    let chat_id = msg.chat.id.0;
    let pending: Vec<_> = state
        .store
        .pending_tasks()
        .await?
        .into_iter()
        .filter(|t| t.chat_id == chat_id)
        .collect();

    if pending.is_empty() {
        return reply_text(state, msg.chat.id, "No pending reminders.").await;
    }

    let mut text = String::from("⏰ Pending reminders\n");
    for task in pending {
        text.push_str(&format!(
            "• {} (due {})\n",
            task.text,
            task.due.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    reply_text(state, msg.chat.id, text).await
}

async fn dna(state: &AppState, msg: &Message) -> Result<()> {
    let dna = state.store.dna().await?;
    reply_text(state, msg.chat.id, dna.summary()).await
}

async fn ask(state: &AppState, msg: &Message, args: &str) -> Result<()> {
    let question = args.trim();
    if question.is_empty() {
        return reply_text(state, msg.chat.id, "Usage: /ask <question>").await;
    }

    let Some(llm) = &state.llm else {
        return reply_text(
            state,
            msg.chat.id,
            "The assistant is not configured (missing OPENAI_API_KEY).",
        )
        .await;
    };

    let reply = match llm.reply(question).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Chat completion failed: {e}");
            "The assistant is unavailable right now.".to_string()
        }
    };
    reply_text(state, msg.chat.id, reply).await
}

async fn broadcast(state: &AppState, msg: &Message, args: &str) -> Result<()> {
    if !require_admin(state, msg).await? {
        return Ok(());
    }

    let text = args.trim();
    if text.is_empty() {
        return reply_text(state, msg.chat.id, "Usage: /broadcast <text>").await;
    }

    let users = state.store.users().await?;
    let mut delivered = 0usize;
    let mut failed = 0usize;
    for user in &users {
        match send_message_resilient(&state.bot, ChatId(user.id), text).await {
            Ok(_) => {
                delivered += 1;
                state.stats.reply_sent();
            }
            Err(e) => {
                warn!("Broadcast to {} failed: {e}", user.id);
                failed += 1;
            }
        }
    }
    info!("Broadcast finished: {delivered} delivered, {failed} failed");

    reply_text(
        state,
        msg.chat.id,
        format!("📣 Broadcast done: {delivered} delivered, {failed} failed."),
    )
    .await
}

async fn users(state: &AppState, msg: &Message) -> Result<()> {
    if !require_admin(state, msg).await? {
        return Ok(());
    }

    let mut users = state.store.users().await?;
    users.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));

    if users.is_empty() {
        return reply_text(state, msg.chat.id, "No users recorded yet.").await;
    }

    let mut text = String::from("👥 Recently seen users\n");
    for user in users.iter().take(20) {
        text.push_str(&format!(
            "• {} {} ({} msgs, last seen {})\n",
            user.first_name,
            user.username
                .as_deref()
                .map(|u| format!("@{u}"))
                .unwrap_or_default(),
            user.message_count,
            user.last_seen.format("%Y-%m-%d %H:%M UTC"),
        ));
    }
    reply_text(state, msg.chat.id, text).await
}

/// Check admin rights; on refusal, send a cooldown-limited denial reply.
async fn require_admin(state: &AppState, msg: &Message) -> Result<bool> {
    let user_id = user_id_of(msg);
    if state.settings.is_admin(user_id) {
        return Ok(true);
    }

    let name = first_name_of(msg);
    if state.denials.should_send(user_id, &name).await {
        info!("⛔️ Refused admin command from user {user_id} ({name})");
        reply_text(state, msg.chat.id, "⛔️ This command is admin-only.").await?;
        state.denials.mark_sent(user_id).await;
    }
    Ok(false)
}

async fn reply_text(state: &AppState, chat_id: ChatId, text: impl Into<String>) -> Result<()> {
    send_message_resilient(&state.bot, chat_id, text).await?;
    state.stats.reply_sent();
    Ok(())
}

pub(crate) async fn record_dna(state: &AppState, kind: MutationKind) {
    if let Err(e) = state.store.modify_dna(|dna| dna.record_mutation(kind)).await {
        warn!("Failed to record DNA mutation {}: {e}", kind.as_str());
    }
}

/// User ID of the sender, 0 for channel posts without a sender
#[must_use]
pub fn user_id_of(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Sender's first name, for logs and scoreboards
#[must_use]
pub fn first_name_of(msg: &Message) -> String {
    msg.from
        .as_ref()
        .map_or_else(|| "Unknown".to_string(), |u| u.first_name.clone())
}
