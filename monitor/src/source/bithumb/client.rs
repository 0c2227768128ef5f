use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::error::MonitorError;
use crate::model::Symbol;
use crate::source::bithumb::errors::BithumbError;
use crate::source::bithumb::types::{DayCandle, Ticker};
use crate::source::{DailyCandle, PriceSource};

/// Bithumb public REST client. No authentication involved.
#[derive(Clone)]
pub struct BithumbClient {
    http: Client,
    url: String,
    quote_currency: String,
}

impl BithumbClient {
    pub fn new(url: String, quote_currency: String, timeout: Duration) -> Result<Self, BithumbError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            quote_currency,
        })
    }

    fn market(&self, symbol: &Symbol) -> String {
        format!("{}-{}", self.quote_currency, symbol)
    }

    #[instrument(skip(self), fields(symbol = %symbol), level = "debug")]
    pub async fn fetch_ticker(&self, symbol: &Symbol) -> Result<Ticker, BithumbError> {
        let url = format!("{}/v1/ticker", self.url);

        let resp = self
            .http
            .get(&url)
            .query(&[("markets", self.market(symbol))])
            .header("accept", "application/json")
            .send()
            .await?
            .error_for_status()?;

        let tickers: Vec<Ticker> = resp.json().await?;
        let ticker = tickers
            .into_iter()
            .next()
            .ok_or_else(|| BithumbError::InvalidResponse("empty ticker array".into()))?;

        debug!(market = %ticker.market, trade_price = %ticker.trade_price, "bithumb ticker fetched");

        Ok(ticker)
    }

    #[instrument(skip(self), fields(symbol = %symbol), level = "debug")]
    pub async fn fetch_day_candles(
        &self,
        symbol: &Symbol,
        count: u32,
    ) -> Result<Vec<DayCandle>, BithumbError> {
        let url = format!("{}/v1/candles/days", self.url);

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("market", self.market(symbol)),
                ("count", count.to_string()),
            ])
            .header("accept", "application/json")
            .send()
            .await?
            .error_for_status()?;

        let candles: Vec<DayCandle> = resp.json().await?;

        debug!(count = candles.len(), "bithumb day candles fetched");

        Ok(candles)
    }
}

/// Converts the newest-first API payload into oldest-first candles.
pub fn to_daily_candles(raw: Vec<DayCandle>) -> Result<Vec<DailyCandle>, BithumbError> {
    let mut out = raw
        .into_iter()
        .map(|c| {
            let day = c.candle_date_time_kst.get(..10).ok_or_else(|| {
                BithumbError::InvalidResponse(format!("bad candle time {}", c.candle_date_time_kst))
            })?;
            Ok(DailyCandle {
                date: NaiveDate::parse_from_str(day, "%Y-%m-%d")?,
                high: c.high_price,
                low: c.low_price,
            })
        })
        .collect::<Result<Vec<_>, BithumbError>>()?;

    out.sort_by_key(|c| c.date);
    Ok(out)
}

#[async_trait]
impl PriceSource for BithumbClient {
    async fn current_price(&self, symbol: &Symbol) -> Result<Decimal, MonitorError> {
        self.fetch_ticker(symbol)
            .await
            .map(|t| t.trade_price)
            .map_err(|e| MonitorError::source_unavailable(symbol.as_str(), e))
    }

    async fn daily_candles(
        &self,
        symbol: &Symbol,
        days: u32,
    ) -> Result<Vec<DailyCandle>, MonitorError> {
        self.fetch_day_candles(symbol, days)
            .await
            .and_then(to_daily_candles)
            .map_err(|e| MonitorError::source_unavailable(symbol.as_str(), e))
    }
}
