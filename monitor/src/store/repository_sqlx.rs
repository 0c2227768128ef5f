use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, SecondsFormat, Utc};
use common::logger::warn_if_slow;
use rust_decimal::Decimal;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};
use tracing::{debug, info, instrument};

use crate::error::MonitorError;
use crate::model::{PriceRecord, Symbol, Watermark};
use crate::store::repository::InstrumentStore;

const DAY_FORMAT: &str = "%Y-%m-%d";

/// SQLx-backed implementation of InstrumentStore.
/// Responsible only for persistence and row mapping.
#[derive(Clone)]
pub struct SqlxInstrumentStore {
    pool: AnyPool,
}

impl SqlxInstrumentStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstrumentStore for SqlxInstrumentStore {
    #[instrument(skip(self), target = "store", fields(symbol = %symbol))]
    async fn ensure_table(&self, symbol: &Symbol) -> Result<bool, MonitorError> {
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let res = sqlx::query(
            r#"
INSERT INTO instruments (symbol, created_at)
VALUES (?, ?)
ON CONFLICT(symbol) DO NOTHING;
"#,
        )
        .bind(symbol.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        let created = res.rows_affected() == 1;
        if created {
            info!("record space created");
        }
        Ok(created)
    }

    #[instrument(skip(self), target = "store", fields(symbol = %symbol))]
    async fn record_count(&self, symbol: &Symbol) -> Result<u64, MonitorError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM price_records WHERE symbol = ?;")
            .bind(symbol.as_str())
            .fetch_one(&self.pool)
            .await?;

        u64::try_from(n)
            .map_err(|_| MonitorError::PersistenceFailure(format!("negative row count: {n}")))
    }

    #[instrument(skip(self), target = "store", fields(symbol = %symbol, today = %today))]
    async fn today_watermark(
        &self,
        symbol: &Symbol,
        today: NaiveDate,
    ) -> Result<Option<Watermark>, MonitorError> {
        let row = warn_if_slow("db_today_watermark", Duration::from_millis(100), async {
            sqlx::query(
                r#"
SELECT high_price, low_price
FROM price_records
WHERE symbol = ? AND trading_day = ?
ORDER BY id DESC
LIMIT 1;
"#,
            )
            .bind(symbol.as_str())
            .bind(today.format(DAY_FORMAT).to_string())
            .fetch_optional(&self.pool)
            .await
        })
        .await?;

        let Some(r) = row else {
            debug!("no record yet today");
            return Ok(None);
        };

        let high = decimal_col(&r, "high_price")?;
        let low = decimal_col(&r, "low_price")?;

        Watermark::new(high, low).map(Some).ok_or_else(|| {
            MonitorError::PersistenceFailure(format!(
                "stored watermark for {symbol} has high {high} below low {low}"
            ))
        })
    }

    #[instrument(skip(self, record), target = "store", fields(symbol = %symbol))]
    async fn insert(&self, symbol: &Symbol, record: &PriceRecord) -> Result<(), MonitorError> {
        warn_if_slow("db_insert_record", Duration::from_millis(50), async {
            insert_query(symbol, record).execute(&self.pool).await
        })
        .await?;

        debug!(
            trade_price = %record.trade_price,
            high_price = %record.high_price,
            low_price = %record.low_price,
            "price record appended"
        );
        Ok(())
    }

    #[instrument(skip(self, records), target = "store", fields(symbol = %symbol, rows = records.len()))]
    async fn insert_history(
        &self,
        symbol: &Symbol,
        records: &[PriceRecord],
    ) -> Result<usize, MonitorError> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM price_records WHERE symbol = ?;")
                .bind(symbol.as_str())
                .fetch_one(&mut *tx)
                .await?;

        if existing > 0 {
            tx.rollback().await?;
            info!(existing, "history already present; skipping seed");
            return Ok(0);
        }

        for record in records {
            insert_query(symbol, record).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }

    #[instrument(skip(self), target = "store", fields(symbol = %symbol, from = %from, to = %to))]
    async fn max_high_between(
        &self,
        symbol: &Symbol,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<Decimal>, MonitorError> {
        let day_from = from.format(DAY_FORMAT).to_string();
        let day_to = to.format(DAY_FORMAT).to_string();

        // The REAL cast narrows the window to rows tied at the top in f64;
        // the exact winner among them is picked in Decimal.
        let rows = warn_if_slow("db_max_high", Duration::from_millis(200), async {
            sqlx::query(
                r#"
SELECT DISTINCT high_price
FROM price_records
WHERE symbol = ? AND trading_day >= ? AND trading_day <= ?
  AND CAST(high_price AS REAL) = (
    SELECT MAX(CAST(high_price AS REAL))
    FROM price_records
    WHERE symbol = ? AND trading_day >= ? AND trading_day <= ?
  );
"#,
            )
            .bind(symbol.as_str())
            .bind(day_from.as_str())
            .bind(day_to.as_str())
            .bind(symbol.as_str())
            .bind(day_from.as_str())
            .bind(day_to.as_str())
            .fetch_all(&self.pool)
            .await
        })
        .await?;

        let mut best: Option<Decimal> = None;
        for r in &rows {
            let high = decimal_col(r, "high_price")?;
            best = Some(best.map_or(high, |b| b.max(high)));
        }
        Ok(best)
    }
}

/* =========================
Row mapping helpers
========================= */

fn insert_query<'q>(
    symbol: &'q Symbol,
    record: &PriceRecord,
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
    sqlx::query(
        r#"
INSERT INTO price_records (symbol, trade_price, high_price, low_price, recorded_at, trading_day)
VALUES (?, ?, ?, ?, ?, ?);
"#,
    )
    .bind(symbol.as_str())
    .bind(record.trade_price.to_string())
    .bind(record.high_price.to_string())
    .bind(record.low_price.to_string())
    .bind(
        record
            .recorded_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    )
    .bind(record.trading_day.format(DAY_FORMAT).to_string())
}

fn decimal_col(r: &AnyRow, col: &str) -> Result<Decimal, MonitorError> {
    let raw: String = r.try_get(col)?;
    Decimal::from_str(&raw)
        .map_err(|e| MonitorError::PersistenceFailure(format!("invalid decimal in {col}: {raw} ({e})")))
}
