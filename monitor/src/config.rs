use std::collections::BTreeSet;
use std::time::Duration;

use chrono::FixedOffset;
use thiserror::Error;

use crate::model::Symbol;
use crate::notify::telegram::TelegramCredentials;
use crate::time::parse_offset;

const REQUIRED: [&str; 3] = ["TELEGRAM_BOT_TOKEN", "TELEGRAM_CHAT_ID", "MONITORED_SYMBOLS"];

/// Startup validation failures. Any of these prevents the monitor from
/// starting.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("MONITORED_SYMBOLS contains no symbols")]
    NoSymbols,

    #[error("invalid symbol in MONITORED_SYMBOLS: {0:?}")]
    InvalidSymbol(String),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Upper bound on pooled connections.
    pub db_max_connections: u32,

    /// Instruments polled every cycle, deduplicated, in first-seen order.
    pub monitored_symbols: Vec<Symbol>,

    /// Offset defining the trading-day boundary. Fixed so rollover never
    /// depends on the host timezone.
    pub market_offset: FixedOffset,

    /// Cadence of the built-in poll loop.
    pub poll_interval: Duration,

    /// Bound on every exchange and notifier call.
    pub call_timeout: Duration,

    /// Completed days seeded on first encounter of a symbol.
    pub history_days: u32,

    /// Quote side of every market (`KRW` → `KRW-BTC`); also the unit shown in
    /// alerts.
    pub quote_currency: String,

    pub exchange_api_url: String,

    pub telegram_api_url: String,
    pub telegram: TelegramCredentials,

    /// Run a single cycle and exit, for cron-style scheduling.
    pub run_once: bool,

    /// JSON log lines instead of the pretty formatter.
    pub json_logs: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = REQUIRED
            .into_iter()
            .filter(|&k| get(k).is_none())
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let monitored_symbols = parse_symbols(&get("MONITORED_SYMBOLS").unwrap_or_default())?;

        let market_offset = match get("MARKET_TZ_OFFSET") {
            None => FixedOffset::east_opt(9 * 3600).ok_or(ConfigError::Invalid {
                key: "MARKET_TZ_OFFSET",
                value: "+09:00".into(),
                reason: "out of range",
            })?,
            Some(raw) => parse_offset(&raw).ok_or(ConfigError::Invalid {
                key: "MARKET_TZ_OFFSET",
                value: raw,
                reason: "expected +HH:MM",
            })?,
        };

        let poll_secs = parse_num(get("POLL_INTERVAL_SECS"), "POLL_INTERVAL_SECS", 60)?;
        let timeout_secs = parse_num(get("CALL_TIMEOUT_SECS"), "CALL_TIMEOUT_SECS", 10)?;

        Ok(Self {
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://price_monitor.db?mode=rwc".to_string()),
            db_max_connections: parse_num(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 4)?,
            monitored_symbols,
            market_offset,
            poll_interval: Duration::from_secs(poll_secs.into()),
            call_timeout: Duration::from_secs(timeout_secs.into()),
            history_days: parse_num(get("HISTORY_DAYS"), "HISTORY_DAYS", 120)?,
            quote_currency: get("QUOTE_CURRENCY")
                .map(|q| q.trim().to_ascii_uppercase())
                .unwrap_or_else(|| "KRW".to_string()),
            exchange_api_url: get("BITHUMB_API_URL")
                .unwrap_or_else(|| "https://api.bithumb.com".to_string()),
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            telegram: TelegramCredentials {
                bot_token: get("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
                chat_id: get("TELEGRAM_CHAT_ID").unwrap_or_default(),
            },
            run_once: parse_flag(get("RUN_ONCE")),
            json_logs: get("APP_ENV").is_some_and(|v| v == "production"),
        })
    }
}

fn parse_symbols(raw: &str) -> Result<Vec<Symbol>, ConfigError> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();

    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let symbol = Symbol::parse(part).ok_or_else(|| ConfigError::InvalidSymbol(part.into()))?;
        if seen.insert(symbol.clone()) {
            out.push(symbol);
        }
    }

    if out.is_empty() {
        return Err(ConfigError::NoSymbols);
    }
    Ok(out)
}

/// Positive integer with a default. Zero is rejected.
fn parse_num(raw: Option<String>, key: &'static str, default: u32) -> Result<u32, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u32>() {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be positive",
        }),
        Ok(v) => Ok(v),
        Err(_) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "not an integer",
        }),
    }
}

fn parse_flag(raw: Option<String>) -> bool {
    raw.is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}
