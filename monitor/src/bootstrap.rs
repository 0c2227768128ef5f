//! One-time historical seeding of a symbol's record space.
//!
//! Seeded rows are ordinary price records dated at the end of each past
//! trading day, so multi-day high queries work from the very first alert.
//! The in-progress day is never seeded: today's watermark must come from
//! live samples only.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use crate::error::MonitorError;
use crate::model::{PriceRecord, Symbol};
use crate::source::{DailyCandle, PriceSource};
use crate::store::InstrumentStore;
use crate::time::MarketClock;

pub struct Bootstrapper {
    store: Arc<dyn InstrumentStore>,
    source: Arc<dyn PriceSource>,
    clock: MarketClock,
    history_days: u32,
    call_timeout: Duration,
}

impl Bootstrapper {
    pub fn new(
        store: Arc<dyn InstrumentStore>,
        source: Arc<dyn PriceSource>,
        clock: MarketClock,
        history_days: u32,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            source,
            clock,
            history_days,
            call_timeout,
        }
    }

    /// Seeds up to `history_days` completed days before `today`. Returns
    /// whether any rows were written; a symbol that already has records is
    /// left untouched.
    #[instrument(skip(self), fields(symbol = %symbol, today = %today))]
    pub async fn bootstrap(&self, symbol: &Symbol, today: NaiveDate) -> Result<bool, MonitorError> {
        // One extra day: the newest candle is usually today's, which is dropped.
        let request_days = self.history_days.saturating_add(1);

        let candles = tokio::time::timeout(
            self.call_timeout,
            self.source.daily_candles(symbol, request_days),
        )
        .await
        .map_err(|_| {
            MonitorError::source_unavailable(
                symbol.as_str(),
                format!("history fetch timed out after {:?}", self.call_timeout),
            )
        })??;

        if candles.is_empty() {
            return Err(MonitorError::source_unavailable(
                symbol.as_str(),
                "history response was empty",
            ));
        }

        let records = seed_records(&candles, today, self.history_days, &self.clock);
        let dropped = candles.len() - records.len();

        let inserted = self.store.insert_history(symbol, &records).await?;

        if inserted == 0 {
            warn!(fetched = candles.len(), "nothing seeded");
            return Ok(false);
        }

        info!(inserted, dropped, "historical days seeded");
        Ok(true)
    }
}

/// Turns candles into synthetic end-of-day records: completed days before
/// `today` only, newest `keep` of them, oldest first. Candles whose high is
/// below their low are discarded.
pub fn seed_records(
    candles: &[DailyCandle],
    today: NaiveDate,
    keep: u32,
    clock: &MarketClock,
) -> Vec<PriceRecord> {
    let mut completed: Vec<&DailyCandle> = candles
        .iter()
        .filter(|c| c.date < today)
        .filter(|c| {
            let sane = c.high >= c.low;
            if !sane {
                warn!(date = %c.date, high = %c.high, low = %c.low, "skipping candle with high below low");
            }
            sane
        })
        .collect();

    completed.sort_by_key(|c| c.date);
    completed.dedup_by_key(|c| c.date);

    let skip = completed.len().saturating_sub(keep as usize);

    completed
        .into_iter()
        .skip(skip)
        .map(|c| PriceRecord {
            trade_price: c.high,
            high_price: c.high,
            low_price: c.low,
            recorded_at: clock.end_of_day(c.date),
            trading_day: c.date,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use rust_decimal::Decimal;

    fn clock() -> MarketClock {
        MarketClock::new(FixedOffset::east_opt(9 * 3600).unwrap())
    }

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, n).unwrap()
    }

    fn candle(n: u32, high: i64, low: i64) -> DailyCandle {
        DailyCandle {
            date: day(n),
            high: Decimal::from(high),
            low: Decimal::from(low),
        }
    }

    #[test]
    fn today_and_future_days_are_not_seeded() {
        let candles = vec![candle(1, 10, 5), candle(2, 11, 6), candle(3, 12, 7)];
        let out = seed_records(&candles, day(3), 120, &clock());
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.trading_day < day(3)));
    }

    #[test]
    fn keeps_only_the_newest_days() {
        let candles: Vec<_> = (1..=10).map(|n| candle(n, 10 + n as i64, 1)).collect();
        let out = seed_records(&candles, day(20), 3, &clock());
        let days: Vec<_> = out.iter().map(|r| r.trading_day).collect();
        assert_eq!(days, vec![day(8), day(9), day(10)]);
    }

    #[test]
    fn seeded_record_uses_high_as_trade_price() {
        let out = seed_records(&[candle(1, 15, 9)], day(2), 120, &clock());
        let r = &out[0];
        assert_eq!(r.trade_price, Decimal::from(15));
        assert_eq!(r.high_price, Decimal::from(15));
        assert_eq!(r.low_price, Decimal::from(9));
        assert_eq!(clock().trading_day(r.recorded_at), day(1));
    }

    #[test]
    fn inverted_candles_are_dropped() {
        let out = seed_records(&[candle(1, 5, 9), candle(2, 9, 9)], day(3), 120, &clock());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].trading_day, day(2));
        assert!(out[0].watermark().is_some());
    }
}
