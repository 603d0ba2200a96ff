//! Configuration and settings management
//!
//! Loads settings from environment variables and defines service constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(rename = "telegram_bot_token")]
    pub telegram_token: String,

    /// Public base URL the webhook is reachable under (e.g. a Railway domain)
    pub webhook_url: Option<String>,

    /// Shared secret embedded in the webhook path and sent back by Telegram
    /// in the `X-Telegram-Bot-Api-Secret-Token` header
    #[serde(default = "default_webhook_secret")]
    pub webhook_secret: String,

    /// Register the webhook with Telegram on startup
    #[serde(default)]
    pub auto_set_webhook: bool,

    /// Comma/space/semicolon-separated list of admin user IDs
    #[serde(rename = "admin_user_id")]
    pub admin_users_str: Option<String>,

    /// Address to bind the HTTP server to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the HTTP server to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the JSON store files
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Alpha Vantage API key for /stock quotes
    pub alphavantage_api_key: Option<String>,
    /// OpenAI API key for chat replies
    pub openai_api_key: Option<String>,
}

fn default_webhook_secret() -> String {
    "change_this_secret".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8000
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Fallback: check environment variables directly if config didn't pick them up
        if settings.webhook_url.is_none() {
            if let Ok(val) = std::env::var("WEBHOOK_URL") {
                if !val.is_empty() {
                    settings.webhook_url = Some(val);
                }
            }
        }
        if settings.admin_users_str.is_none() {
            if let Ok(val) = std::env::var("ADMIN_USER_ID") {
                if !val.is_empty() {
                    settings.admin_users_str = Some(val);
                }
            }
        }
        if settings.alphavantage_api_key.is_none() {
            if let Ok(val) = std::env::var("ALPHAVANTAGE_API_KEY") {
                if !val.is_empty() {
                    settings.alphavantage_api_key = Some(val);
                }
            }
        }
        if settings.openai_api_key.is_none() {
            if let Ok(val) = std::env::var("OPENAI_API_KEY") {
                if !val.is_empty() {
                    settings.openai_api_key = Some(val);
                }
            }
        }

        Ok(settings)
    }

    /// Returns the set of Telegram IDs with admin privileges
    #[must_use]
    pub fn admin_users(&self) -> HashSet<i64> {
        self.admin_users_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns true when the given user ID is an admin
    #[must_use]
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_users().contains(&user_id)
    }

    /// Full webhook URL as registered with Telegram, if a base URL is set
    #[must_use]
    pub fn full_webhook_url(&self) -> Option<String> {
        self.webhook_url.as_ref().map(|base| {
            format!(
                "{}/webhook/{}",
                base.trim_end_matches('/'),
                self.webhook_secret
            )
        })
    }
}

/// Cap on the message log length; oldest entries are dropped beyond this
pub const MESSAGE_LOG_CAP: usize = 1000;
/// Cap on the DNA recent-mutation log
pub const DNA_RECENT_CAP: usize = 50;
/// Fitness points required per generation advance
pub const DNA_GENERATION_THRESHOLD: f64 = 50.0;

/// Maximum message length for Telegram with safety margin
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// Maximum retry attempts for Telegram API operations
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Base for the exponential retry backoff (milliseconds); with three
/// retries the delays are 10ms, 100ms, 1s
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 10;
/// Maximum backoff delay for Telegram API retries (milliseconds)
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 5000;

/// Seconds a quiz question stays open in a chat
pub const QUIZ_SESSION_TTL_SECS: u64 = 180;
/// Maximum number of concurrently open quiz sessions
pub const QUIZ_SESSION_MAX: u64 = 10_000;

/// Cooldown between denial replies to the same unauthorized user
/// (seconds); denial cache entries expire after this
pub const DENIAL_COOLDOWN_SECS: u64 = 600;
/// Maximum entries in the denial cache
pub const DENIAL_CACHE_MAX: u64 = 10_000;

/// Seconds between reminder scheduler scans
pub const REMINDER_POLL_SECS: u64 = 30;

/// Upper bound for a /remind delay (one year, in minutes); larger values
/// would overflow the due-time arithmetic
pub const REMIND_MAX_MINUTES: i64 = 527_040;

/// Timeout for outbound quote API calls (seconds)
pub const QUOTE_HTTP_TIMEOUT_SECS: u64 = 10;

/// Model used for chat replies
pub const CHAT_MODEL: &str = "gpt-4o-mini";
/// Maximum tokens for a chat reply
pub const CHAT_MAX_TOKENS: u32 = 700;
/// System prompt for chat replies
pub const CHAT_SYSTEM_PROMPT: &str =
    "You are a helpful Telegram bot assistant. Keep answers short and concrete.";

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // These touch process-wide env vars; each test restores what it sets.
    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        env::set_var("TELEGRAM_BOT_TOKEN", "dummy_token");
        env::set_var("WEBHOOK_URL", "https://example.up.railway.app");

        let settings = Settings::new()?;
        assert_eq!(settings.telegram_token, "dummy_token");
        assert_eq!(
            settings.webhook_url,
            Some("https://example.up.railway.app".to_string())
        );
        assert_eq!(settings.webhook_secret, "change_this_secret");
        assert_eq!(settings.port, 8000);

        // Empty env var is treated as unset
        env::set_var("WEBHOOK_URL", "");
        let settings = Settings::new()?;
        assert_eq!(settings.webhook_url, None);

        env::remove_var("TELEGRAM_BOT_TOKEN");
        env::remove_var("WEBHOOK_URL");
        Ok(())
    }

    fn bare_settings() -> Settings {
        Settings {
            telegram_token: "dummy".to_string(),
            webhook_url: None,
            webhook_secret: default_webhook_secret(),
            auto_set_webhook: false,
            admin_users_str: None,
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            alphavantage_api_key: None,
            openai_api_key: None,
        }
    }

    #[test]
    fn test_admin_list_parsing() {
        let mut settings = bare_settings();

        settings.admin_users_str = Some("123,456".to_string());
        let admins = settings.admin_users();
        assert!(admins.contains(&123));
        assert!(admins.contains(&456));
        assert_eq!(admins.len(), 2);

        settings.admin_users_str = Some("333; 444, 555".to_string());
        let admins = settings.admin_users();
        assert_eq!(admins.len(), 3);
        assert!(settings.is_admin(555));
        assert!(!settings.is_admin(666));

        // Garbage tokens are skipped
        settings.admin_users_str = Some("abc, 777".to_string());
        let admins = settings.admin_users();
        assert!(admins.contains(&777));
        assert_eq!(admins.len(), 1);
    }

    #[test]
    fn test_full_webhook_url_strips_trailing_slash() {
        let mut settings = bare_settings();
        settings.webhook_url = Some("https://bot.example.com/".to_string());
        assert_eq!(
            settings.full_webhook_url(),
            Some("https://bot.example.com/webhook/change_this_secret".to_string())
        );

        settings.webhook_url = None;
        assert_eq!(settings.full_webhook_url(), None);
    }
}
