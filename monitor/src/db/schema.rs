use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // One row per symbol whose record space has been created.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS instruments (
  symbol TEXT PRIMARY KEY,
  created_at TEXT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Append-only price history, partitioned by symbol.
    // Prices are canonical decimal strings.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS price_records (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  symbol TEXT NOT NULL,
  trade_price TEXT NOT NULL,
  high_price TEXT NOT NULL,
  low_price TEXT NOT NULL,
  recorded_at TEXT NOT NULL,
  trading_day TEXT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_price_records_symbol_recorded_at ON price_records(symbol, recorded_at DESC);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_price_records_symbol_day ON price_records(symbol, trading_day DESC);"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
