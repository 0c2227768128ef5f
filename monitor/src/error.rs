use thiserror::Error;

/// Per-symbol failures. None of these abort the process; the orchestrator
/// logs them and moves on to the next symbol.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Network or parse failure talking to the exchange.
    #[error("price source unavailable for {symbol}: {reason}")]
    SourceUnavailable { symbol: String, reason: String },

    /// Read or write failure against the instrument store.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    /// The notification sink rejected or never received the alert.
    #[error("alert delivery failed for {symbol}: {reason}")]
    DeliveryFailed { symbol: String, reason: String },
}

impl MonitorError {
    pub fn source_unavailable(symbol: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            symbol: symbol.into(),
            reason: reason.to_string(),
        }
    }

    pub fn delivery_failed(symbol: impl Into<String>, reason: impl ToString) -> Self {
        Self::DeliveryFailed {
            symbol: symbol.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::PersistenceFailure(_) => "persistence_failure",
            Self::DeliveryFailed { .. } => "delivery_failed",
        }
    }
}

impl From<sqlx::Error> for MonitorError {
    fn from(e: sqlx::Error) -> Self {
        Self::PersistenceFailure(e.to_string())
    }
}
