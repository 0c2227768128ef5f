pub mod message;
pub mod telegram;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

use crate::error::MonitorError;
use crate::model::{BreachEvent, HistoricalHighs, Symbol};

pub use telegram::TelegramNotifier;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertKind {
    NewHigh,
    NewLow,
}

impl AlertKind {
    /// `None` for `NoEvent`: nothing to announce.
    pub fn from_event(event: BreachEvent) -> Option<Self> {
        match event {
            BreachEvent::HighBreach => Some(Self::NewHigh),
            BreachEvent::LowBreach => Some(Self::NewLow),
            BreachEvent::NoEvent => None,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewHigh => f.write_str("HIGH"),
            Self::NewLow => f.write_str("LOW"),
        }
    }
}

/// Everything a sink needs to announce one watermark breach.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub symbol: Symbol,
    pub kind: AlertKind,
    pub current_price: Decimal,
    pub highs: HistoricalHighs,
    /// Sample time in market-local time.
    pub at: DateTime<FixedOffset>,
}

/// Single alert sink. Failures surface as `DeliveryFailed` and are never
/// retried by the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), MonitorError>;
}
