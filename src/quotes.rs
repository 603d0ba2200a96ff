//! Stock quotes via the Alpha Vantage GLOBAL_QUOTE endpoint

use crate::config::QUOTE_HTTP_TIMEOUT_SECS;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const API_BASE: &str = "https://www.alphavantage.co/query";

#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("quote request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Alpha Vantage rate limit: {0}")]
    RateLimited(String),
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

/// Raw GLOBAL_QUOTE payload; Alpha Vantage prefixes keys with ordinals
#[derive(Debug, Deserialize)]
struct GlobalQuoteEnvelope {
    #[serde(rename = "Global Quote")]
    global_quote: Option<RawQuote>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

/// A parsed stock quote
#[derive(Debug, Clone, PartialEq)]
pub struct StockQuote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: String,
}

impl StockQuote {
    /// Reply line for the /stock command
    #[must_use]
    pub fn render(&self) -> String {
        let arrow = if self.change >= 0.0 { "📈" } else { "📉" };
        format!(
            "{arrow} {}: {:.2} ({:+.2}, {})",
            self.symbol, self.price, self.change, self.change_percent
        )
    }
}

/// Alpha Vantage client over the shared reqwest stack
pub struct QuoteClient {
    http: reqwest::Client,
    api_key: String,
}

impl QuoteClient {
    /// Build a client with the configured API key
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, QuoteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(QUOTE_HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
        })
    }

    /// Fetch the latest quote for a symbol
    ///
    /// # Errors
    ///
    /// Returns an error on HTTP failure, rate limiting, or an unknown symbol.
    pub async fn global_quote(&self, symbol: &str) -> Result<StockQuote, QuoteError> {
        let symbol = symbol.trim().to_uppercase();
        debug!("Fetching quote for {symbol}");

        let envelope: GlobalQuoteEnvelope = self
            .http
            .get(API_BASE)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_envelope(envelope, &symbol)
    }
}

fn parse_envelope(envelope: GlobalQuoteEnvelope, symbol: &str) -> Result<StockQuote, QuoteError> {
    if let Some(note) = envelope.note.or(envelope.information) {
        return Err(QuoteError::RateLimited(note));
    }

    let raw = envelope
        .global_quote
        .ok_or_else(|| QuoteError::Malformed("missing Global Quote object".to_string()))?;

    // Alpha Vantage answers unknown symbols with an empty quote object
    let (Some(sym), Some(price)) = (raw.symbol, raw.price) else {
        return Err(QuoteError::UnknownSymbol(symbol.to_string()));
    };

    let price: f64 = price
        .parse()
        .map_err(|_| QuoteError::Malformed(format!("unparseable price: {price}")))?;
    let change: f64 = raw
        .change
        .as_deref()
        .unwrap_or("0")
        .parse()
        .unwrap_or(0.0);

    Ok(StockQuote {
        symbol: sym,
        price,
        change,
        change_percent: raw.change_percent.unwrap_or_else(|| "n/a".to_string()),
    })
}
