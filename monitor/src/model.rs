use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trailing day windows reported with every alert.
pub const HIGH_WINDOWS: [u32; 4] = [5, 20, 60, 120];

const MAX_SYMBOL_LEN: usize = 16;

/// Exchange ticker such as `BTC`. Always uppercase ASCII alphanumeric.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Trims and uppercases `raw`; returns `None` for empty, overly long or
    /// non-alphanumeric input.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim().to_ascii_uppercase();
        if s.is_empty() || s.len() > MAX_SYMBOL_LEN {
            return None;
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Running intraday extremes. `high >= low` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Watermark {
    high: Decimal,
    low: Decimal,
}

impl Watermark {
    pub fn new(high: Decimal, low: Decimal) -> Option<Self> {
        (high >= low).then_some(Self { high, low })
    }

    /// Opening watermark of a day: both extremes at the first trade.
    pub fn opening(price: Decimal) -> Self {
        Self {
            high: price,
            low: price,
        }
    }

    pub fn high(&self) -> Decimal {
        self.high
    }

    pub fn low(&self) -> Decimal {
        self.low
    }
}

/// One persisted sample. `high_price`/`low_price` are the watermark as of
/// this row, not all-time extremes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceRecord {
    pub trade_price: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub recorded_at: DateTime<Utc>,
    /// Calendar date of `recorded_at` in the market timezone.
    pub trading_day: NaiveDate,
}

impl PriceRecord {
    pub fn watermark(&self) -> Option<Watermark> {
        Watermark::new(self.high_price, self.low_price)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreachEvent {
    HighBreach,
    LowBreach,
    NoEvent,
}

impl BreachEvent {
    pub fn is_breach(self) -> bool {
        !matches!(self, BreachEvent::NoEvent)
    }
}

impl fmt::Display for BreachEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BreachEvent::HighBreach => "high_breach",
            BreachEvent::LowBreach => "low_breach",
            BreachEvent::NoEvent => "no_event",
        };
        f.write_str(s)
    }
}

/// Max high per trailing window, in the order the windows were requested.
/// `None` means the window holds no records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoricalHighs {
    entries: Vec<(u32, Option<Decimal>)>,
}

impl HistoricalHighs {
    pub fn push(&mut self, window_days: u32, high: Option<Decimal>) {
        self.entries.push((window_days, high));
    }

    pub fn get(&self, window_days: u32) -> Option<Decimal> {
        self.entries
            .iter()
            .find(|(w, _)| *w == window_days)
            .and_then(|(_, h)| *h)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, Option<Decimal>)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
