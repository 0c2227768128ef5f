use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::MonitorError;
use crate::model::{HistoricalHighs, PriceRecord, Symbol, Watermark};
use crate::time::window_start;

/// Per-symbol, append-only price history.
///
/// Every query is scoped to a single symbol; implementations must never
/// let one symbol's rows influence another's results.
#[async_trait]
pub trait InstrumentStore: Send + Sync {
    /// Registers the symbol's record space. Returns `true` only for the call
    /// that actually created it.
    async fn ensure_table(&self, symbol: &Symbol) -> Result<bool, MonitorError>;

    async fn record_count(&self, symbol: &Symbol) -> Result<u64, MonitorError>;

    /// Watermark of the most recent record dated `today`, or `None` when
    /// nothing has been recorded yet that day.
    async fn today_watermark(
        &self,
        symbol: &Symbol,
        today: NaiveDate,
    ) -> Result<Option<Watermark>, MonitorError>;

    async fn insert(&self, symbol: &Symbol, record: &PriceRecord) -> Result<(), MonitorError>;

    /// Appends `records` in one transaction, but only when the symbol has no
    /// records at all. Returns how many rows were written.
    async fn insert_history(
        &self,
        symbol: &Symbol,
        records: &[PriceRecord],
    ) -> Result<usize, MonitorError>;

    /// Max `high_price` among records with `from <= trading_day <= to`.
    async fn max_high_between(
        &self,
        symbol: &Symbol,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<Decimal>, MonitorError>;

    /// Max high over each trailing window of `windows` days ending `today`.
    async fn historical_highs(
        &self,
        symbol: &Symbol,
        today: NaiveDate,
        windows: &[u32],
    ) -> Result<HistoricalHighs, MonitorError> {
        let mut out = HistoricalHighs::default();
        for &days in windows {
            let high = self
                .max_high_between(symbol, window_start(today, days), today)
                .await?;
            out.push(days, high);
        }
        Ok(out)
    }
}
