pub mod bithumb;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::MonitorError;
use crate::model::Symbol;

/// One day of exchange history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailyCandle {
    pub date: NaiveDate,
    pub high: Decimal,
    pub low: Decimal,
}

/// Exchange price feed. Both calls fail with `SourceUnavailable`.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn current_price(&self, symbol: &Symbol) -> Result<Decimal, MonitorError>;

    /// Up to `days` daily candles, oldest first.
    async fn daily_candles(
        &self,
        symbol: &Symbol,
        days: u32,
    ) -> Result<Vec<DailyCandle>, MonitorError>;
}
