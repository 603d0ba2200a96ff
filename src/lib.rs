//! railbot: a consolidated Telegram webhook bot service
//!
//! One axum server receives Telegram updates on a secret-protected webhook
//! endpoint, routes them through a single command dispatcher, and persists
//! users, messages, tasks, quiz scores and DNA telemetry as JSON files on
//! local disk.

/// Telegram bot: commands, dispatch, handlers, quiz, flood protection
pub mod bot;
/// Settings and service constants
pub mod config;
/// DNA self-description telemetry
pub mod dna;
/// OpenAI chat wrapper
pub mod llm;
/// Alpha Vantage stock quotes
pub mod quotes;
/// Background reminder loop
pub mod scheduler;
/// HTTP surface and shared state
pub mod server;
/// In-memory service counters
pub mod stats;
/// JSON-file store
pub mod storage;
/// Shared helpers
pub mod utils;
/// Telegram webhook management
pub mod webhook;
