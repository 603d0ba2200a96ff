/// Command grammar
pub mod commands;
/// Denial-reply flood protection
pub mod cooldown;
/// Update pipeline
pub mod dispatch;
/// Command and message handlers
pub mod handlers;
/// Quiz question bank and sessions
pub mod quiz;
/// Resilient Telegram sends
pub mod resilient;

pub use cooldown::DenialCache;
pub use quiz::QuizSessions;
