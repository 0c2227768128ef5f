use rust_decimal::Decimal;
use serde::Deserialize;

/// Element of `GET /v1/ticker`.
#[derive(Debug, Deserialize)]
pub struct Ticker {
    pub market: String,
    pub trade_price: Decimal,
}

/// Element of `GET /v1/candles/days`, newest first.
#[derive(Debug, Deserialize)]
pub struct DayCandle {
    pub market: String,
    /// `YYYY-MM-DDTHH:MM:SS` in KST.
    pub candle_date_time_kst: String,
    pub high_price: Decimal,
    pub low_price: Decimal,
}
