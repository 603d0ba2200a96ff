use dotenvy::dotenv;
use railbot::bot::{DenialCache, QuizSessions};
use railbot::config::Settings;
use railbot::llm::ChatClient;
use railbot::quotes::QuoteClient;
use railbot::server::{router, AppState};
use railbot::stats::ServiceStats;
use railbot::storage::JsonStore;
use railbot::{scheduler, webhook};
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting the bot token from log output
struct RedactionPatterns {
    token_url: Regex,
    token_bare: Regex,
    token_prefixed: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token_bare: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token_prefixed: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token_url
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token_bare
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token_prefixed
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original buffer length to satisfy the contract,
        // even if the redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting railbot...");

    let settings = init_settings();
    let store = init_store(&settings);

    let bot = Bot::new(settings.telegram_token.clone());
    let bot_username = fetch_bot_username(&bot).await;

    let state = AppState {
        bot: bot.clone(),
        settings: settings.clone(),
        store,
        stats: Arc::new(ServiceStats::new()),
        quiz: Arc::new(QuizSessions::new()),
        denials: Arc::new(DenialCache::new()),
        llm: settings
            .openai_api_key
            .as_ref()
            .map(|key| Arc::new(ChatClient::new(key.clone()))),
        quotes: init_quotes(&settings),
        bot_username: Arc::new(bot_username),
    };

    // Background reminder loop
    tokio::spawn(scheduler::run(state.clone()));

    // Optional webhook self-registration
    webhook::maybe_auto_register(bot, settings.clone());

    let app = router(state);
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down cleanly");
    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_store(settings: &Settings) -> Arc<JsonStore> {
    match JsonStore::open(&settings.data_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open JSON store: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_quotes(settings: &Settings) -> Option<Arc<QuoteClient>> {
    let key = settings.alphavantage_api_key.as_ref()?;
    match QuoteClient::new(key.clone()) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("Quote client unavailable: {e}");
            None
        }
    }
}

/// Best-effort getMe so commands addressed as `/cmd@username` resolve.
/// Falls back to the service name when Telegram is unreachable at startup.
async fn fetch_bot_username(bot: &Bot) -> String {
    match bot.get_me().await {
        Ok(me) => {
            let username = me.username().to_string();
            info!("Authenticated as @{username}");
            username
        }
        Err(e) => {
            warn!("getMe failed, command mentions may not match: {e}");
            "railbot".to_string()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install ctrl-c handler: {e}");
    }
    info!("Shutdown signal received");
}
