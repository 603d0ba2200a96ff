//! Bot command grammar

use crate::config::REMIND_MAX_MINUTES;
use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "start the bot.")]
    Start,
    #[command(description = "show this help.")]
    Help,
    #[command(description = "show your Telegram IDs.")]
    Id,
    #[command(description = "service statistics.")]
    Stats,
    #[command(description = "stock quote, e.g. /stock IBM.")]
    Stock(String),
    #[command(description = "ask a quiz question.")]
    Quiz,
    #[command(description = "quiz scoreboard.")]
    Score,
    #[command(description = "set a reminder: /remind <minutes> <text>.")]
    Remind(String),
    #[command(description = "list pending reminders.")]
    Tasks,
    #[command(description = "show the bot's DNA.")]
    Dna,
    #[command(description = "ask the assistant.")]
    Ask(String),
    #[command(description = "admin: broadcast to all known users.")]
    Broadcast(String),
    #[command(description = "admin: recently seen users.")]
    Users,
}

/// Parse the `/remind` argument string as `<minutes> <text>`.
///
/// Minutes must be positive and at most [`REMIND_MAX_MINUTES`]; values
/// beyond that would overflow the due-time arithmetic.
#[must_use]
pub fn parse_remind(args: &str) -> Option<(i64, String)> {
    let mut parts = args.trim().splitn(2, char::is_whitespace);
    let minutes: i64 = parts.next()?.parse().ok()?;
    let text = parts.next()?.trim();
    if minutes <= 0 || minutes > REMIND_MAX_MINUTES || text.is_empty() {
        return None;
    }
    Some((minutes, text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert_eq!(
            Command::parse("/start", "railbot").ok(),
            Some(Command::Start)
        );
        assert_eq!(
            Command::parse("/stock IBM", "railbot").ok(),
            Some(Command::Stock("IBM".to_string()))
        );
        // Commands addressed to another bot are rejected
        assert!(Command::parse("/start@otherbot", "railbot").is_err());
        assert_eq!(
            Command::parse("/start@railbot", "railbot").ok(),
            Some(Command::Start)
        );
        assert!(Command::parse("hello there", "railbot").is_err());
    }

    #[test]
    fn test_remind_argument_parsing() {
        assert_eq!(
            parse_remind("15 drink water"),
            Some((15, "drink water".to_string()))
        );
        assert_eq!(parse_remind("  5   call mom  "), Some((5, "call mom".to_string())));
        assert_eq!(parse_remind("0 too soon"), None);
        assert_eq!(parse_remind("-3 nope"), None);
        assert_eq!(parse_remind("soon standup"), None);
        assert_eq!(parse_remind("10"), None);
        assert_eq!(parse_remind(""), None);
    }

    #[test]
    fn test_remind_minutes_are_bounded() {
        // Values past the cap would overflow chrono's minute arithmetic
        assert_eq!(parse_remind("999999999999999 drink water"), None);
        assert_eq!(parse_remind(&format!("{} later", i64::MAX)), None);
        assert_eq!(
            parse_remind(&format!("{REMIND_MAX_MINUTES} yearly checkup")),
            Some((REMIND_MAX_MINUTES, "yearly checkup".to_string()))
        );
        assert_eq!(parse_remind(&format!("{} too far", REMIND_MAX_MINUTES + 1)), None);
    }
}
