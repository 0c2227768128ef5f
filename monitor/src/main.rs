use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::logger::init_logger;
use monitor::{
    config::AppConfig,
    cycle::CycleOrchestrator,
    db::Db,
    notify::TelegramNotifier,
    source::bithumb::BithumbClient,
    store::SqlxInstrumentStore,
    time::MarketClock,
};
use tokio::time::{MissedTickBehavior, interval};

/// Connects, migrates and wraps the database in the instrument store.
async fn init_store(cfg: &AppConfig) -> anyhow::Result<Arc<SqlxInstrumentStore>> {
    let db = Db::connect(&cfg.database_url, cfg.db_max_connections).await?;
    db.migrate().await?;

    Ok(Arc::new(SqlxInstrumentStore::new(db.pool)))
}

async fn build_orchestrator(cfg: &AppConfig) -> anyhow::Result<Arc<CycleOrchestrator>> {
    let store = init_store(cfg).await?;

    let source = Arc::new(BithumbClient::new(
        cfg.exchange_api_url.clone(),
        cfg.quote_currency.clone(),
        cfg.call_timeout,
    )?);

    let notifier = Arc::new(TelegramNotifier::new(
        cfg.telegram_api_url.clone(),
        cfg.telegram.clone(),
        cfg.quote_currency.clone(),
        cfg.call_timeout,
    )?);

    Ok(Arc::new(CycleOrchestrator::new(
        cfg.monitored_symbols.clone(),
        store,
        source,
        notifier,
        MarketClock::new(cfg.market_offset),
        cfg.history_days,
        cfg.call_timeout,
    )))
}

/// Fixed-cadence trigger. Each tick spawns its own cycle so a slow symbol
/// never delays the next trigger; the orchestrator skips symbols whose
/// previous cycle is still running.
fn start_poll_loop(orchestrator: Arc<CycleOrchestrator>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            every_ms = every.as_millis() as u64,
            symbols = orchestrator.symbols().len(),
            "poll loop started"
        );

        loop {
            ticker.tick().await;

            let o = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                o.run_cycle(Utc::now()).await;
            });
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The log format comes from the config, so it is loaded first; a
    // config error is logged right after the logger comes up.
    let loaded = AppConfig::from_env();
    let json_logs = loaded.as_ref().is_ok_and(|cfg| cfg.json_logs);
    init_logger("price-monitor", json_logs);

    let cfg = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return Err(e.into());
        }
    };

    tracing::info!(
        symbols = ?cfg.monitored_symbols.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        offset = %cfg.market_offset,
        "starting price monitor"
    );

    let orchestrator = build_orchestrator(&cfg).await?;

    if cfg.run_once {
        let report = orchestrator.run_cycle(Utc::now()).await;
        tracing::info!(
            processed = report.processed(),
            total = report.statuses.len(),
            "single cycle complete"
        );
        return Ok(());
    }

    start_poll_loop(orchestrator, cfg.poll_interval);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    Ok(())
}
