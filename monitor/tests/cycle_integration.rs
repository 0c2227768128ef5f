
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use chrono::{DateTime, Days, FixedOffset, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use tracing_test::traced_test;
use uuid::Uuid;

use mock_capabilities::{MockNotifier, MockPriceSource};
use monitor::cycle::{CycleOrchestrator, Delivery, SymbolReport, SymbolStatus};
use monitor::db::Db;
use monitor::error::MonitorError;
use monitor::model::{BreachEvent, Symbol};
use monitor::notify::AlertKind;
use monitor::source::DailyCandle;
use monitor::store::{InstrumentStore, SqlxInstrumentStore};
use monitor::time::MarketClock;

// -----------------------
// Fixtures
// -----------------------

struct Harness {
    orchestrator: Arc<CycleOrchestrator>,
    store: Arc<SqlxInstrumentStore>,
    source: Arc<MockPriceSource>,
    notifier: Arc<MockNotifier>,
}

fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

fn sym(s: &str) -> Symbol {
    Symbol::parse(s).unwrap()
}

/// `hh:mm` on `day` in KST, as UTC.
fn at(day: NaiveDate, hh: u32, mm: u32) -> DateTime<Utc> {
    kst()
        .from_local_datetime(&day.and_hms_opt(hh, mm, 0).unwrap())
        .single()
        .unwrap()
        .with_timezone(&Utc)
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
}

fn days_before(d: NaiveDate, n: u64) -> NaiveDate {
    d.checked_sub_days(Days::new(n)).unwrap()
}

fn candle(date: NaiveDate, high: i64, low: i64) -> DailyCandle {
    DailyCandle {
        date,
        high: Decimal::from(high),
        low: Decimal::from(low),
    }
}

/// `days` completed candles ending yesterday, flat at `high`/`low`.
fn flat_history(days: u64, high: i64, low: i64) -> Vec<DailyCandle> {
    (1..=days)
        .rev()
        .map(|back| candle(days_before(today(), back), high, low))
        .collect()
}

async fn harness(symbols: &[&str], call_timeout: Duration) -> Harness {
    let db_name = Uuid::new_v4().to_string();
    let conn = format!("sqlite:file:{}?mode=memory&cache=shared", db_name);
    let db = Db::connect(&conn, 1).await.expect("connect sqlite memory db");
    db.migrate().await.expect("migrate");

    let store = Arc::new(SqlxInstrumentStore::new(db.pool));
    let source = MockPriceSource::new();
    let notifier = MockNotifier::new();

    let orchestrator = Arc::new(CycleOrchestrator::new(
        symbols.iter().map(|s| sym(s)).collect(),
        store.clone(),
        source.clone(),
        notifier.clone(),
        MarketClock::new(kst()),
        120,
        call_timeout,
    ));

    Harness {
        orchestrator,
        store,
        source,
        notifier,
    }
}

fn processed<'a>(status: Option<&'a SymbolStatus>) -> &'a SymbolReport {
    match status {
        Some(SymbolStatus::Processed(r)) => r,
        other => panic!("expected processed symbol, got {other:?}"),
    }
}

// -----------------------
// Tests
// -----------------------

#[tokio::test]
async fn intraday_sequence_alerts_once_per_new_extreme() {
    let h = harness(&["BTC"], Duration::from_secs(2)).await;
    let btc = sym("BTC");

    let mut history = flat_history(120, 100, 50);
    // Highs inside the 5-day and 20-day windows.
    history[119] = candle(days_before(today(), 1), 120, 50);
    history[109] = candle(days_before(today(), 11), 300, 50);
    h.source.set_history("BTC", history).await;
    h.source.push_prices("BTC", &[100, 105, 103, 108, 108, 104]).await;

    let mut events = Vec::new();
    for minute in 0..6 {
        let report = h.orchestrator.run_cycle(at(today(), 10, minute)).await;
        events.push(processed(report.status(&btc)).event);
    }

    assert_eq!(
        events,
        vec![
            BreachEvent::NoEvent,
            BreachEvent::HighBreach,
            BreachEvent::NoEvent,
            BreachEvent::HighBreach,
            BreachEvent::NoEvent,
            BreachEvent::NoEvent,
        ]
    );

    let wm = h.store.today_watermark(&btc, today()).await.unwrap().unwrap();
    assert_eq!(wm.high(), Decimal::from(108));
    assert_eq!(wm.low(), Decimal::from(100));

    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|a| a.kind == AlertKind::NewHigh));
    assert_eq!(sent[0].current_price, Decimal::from(105));
    assert_eq!(sent[1].current_price, Decimal::from(108));

    let first = &sent[0];
    assert_eq!(first.highs.get(5), Some(Decimal::from(120)));
    assert_eq!(first.highs.get(20), Some(Decimal::from(300)));
    assert_eq!(first.highs.get(120), Some(Decimal::from(300)));
    assert_eq!(first.at.offset().local_minus_utc(), 9 * 3600);
}

#[tokio::test]
async fn cold_start_seeds_history_without_false_breach() {
    let h = harness(&["BTC"], Duration::from_secs(2)).await;
    let btc = sym("BTC");

    // 120 completed days plus the in-progress day, whose extremes would
    // otherwise dominate today's comparison.
    let mut history = flat_history(120, 10_000, 9_000);
    history.push(candle(today(), 1_000_000, 1));
    h.source.set_history("BTC", history).await;
    h.source.push_prices("BTC", &[500, 501]).await;

    let report = h.orchestrator.run_cycle(at(today(), 9, 30)).await;
    let r = processed(report.status(&btc));
    assert!(r.bootstrapped);
    assert_eq!(r.event, BreachEvent::NoEvent);
    assert_eq!(r.delivery, Delivery::NotRequired);
    assert_eq!(r.watermark.high(), Decimal::from(500));
    assert_eq!(r.watermark.low(), Decimal::from(500));

    assert_eq!(h.store.record_count(&btc).await.unwrap(), 121);

    // Second cycle: no re-seed, and the breach is measured against today only.
    let report = h.orchestrator.run_cycle(at(today(), 9, 31)).await;
    let r = processed(report.status(&btc));
    assert!(!r.bootstrapped);
    assert_eq!(r.event, BreachEvent::HighBreach);
    assert_eq!(h.source.history_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.record_count(&btc).await.unwrap(), 122);

    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].highs.get(5), Some(Decimal::from(10_000)));
}

#[tokio::test]
async fn failing_symbol_does_not_block_others() {
    let h = harness(&["BTC", "ETH"], Duration::from_secs(2)).await;
    let btc = sym("BTC");
    let eth = sym("ETH");

    h.source.set_history("BTC", flat_history(5, 10, 5)).await;
    h.source.set_history("ETH", flat_history(5, 10, 5)).await;
    h.source.fail_prices("BTC").await;
    h.source.push_prices("ETH", &[100, 110]).await;

    let first = h.orchestrator.run_cycle(at(today(), 11, 0)).await;
    let second = h.orchestrator.run_cycle(at(today(), 11, 1)).await;

    for report in [&first, &second] {
        assert!(matches!(
            report.status(&btc),
            Some(SymbolStatus::Failed(MonitorError::SourceUnavailable { .. }))
        ));
    }
    assert_eq!(processed(second.status(&eth)).event, BreachEvent::HighBreach);
    assert_eq!(second.processed(), 1);

    // BTC holds only its seeded history: no partial live record.
    assert_eq!(h.store.record_count(&btc).await.unwrap(), 5);
    assert!(h.store.today_watermark(&btc, today()).await.unwrap().is_none());

    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].symbol, eth);
}

#[tokio::test]
async fn failed_bootstrap_is_retried_next_cycle() {
    let h = harness(&["XRP"], Duration::from_secs(2)).await;
    let xrp = sym("XRP");

    h.source.set_history("XRP", flat_history(120, 900, 800)).await;
    h.source.fail_history("XRP", 1).await;
    h.source.push_prices("XRP", &[850]).await;

    let report = h.orchestrator.run_cycle(at(today(), 12, 0)).await;
    assert!(matches!(
        report.status(&xrp),
        Some(SymbolStatus::Failed(MonitorError::SourceUnavailable { .. }))
    ));
    assert_eq!(h.store.record_count(&xrp).await.unwrap(), 0);
    // The live price was never fetched, so it is still queued.
    assert_eq!(h.source.price_calls.load(Ordering::SeqCst), 0);

    let report = h.orchestrator.run_cycle(at(today(), 12, 1)).await;
    let r = processed(report.status(&xrp));
    assert!(r.bootstrapped);
    assert_eq!(h.store.record_count(&xrp).await.unwrap(), 121);
    assert_eq!(h.source.history_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn empty_history_response_leaves_symbol_for_retry() {
    let h = harness(&["NEW"], Duration::from_secs(2)).await;
    let new = sym("NEW");
    h.source.push_prices("NEW", &[1]).await;

    let report = h.orchestrator.run_cycle(at(today(), 12, 0)).await;
    assert!(matches!(
        report.status(&new),
        Some(SymbolStatus::Failed(MonitorError::SourceUnavailable { .. }))
    ));
    assert_eq!(h.store.record_count(&new).await.unwrap(), 0);
}

#[tokio::test]
#[traced_test]
async fn delivery_failure_keeps_record_and_does_not_realert() {
    let h = harness(&["BTC"], Duration::from_secs(2)).await;
    let btc = sym("BTC");

    h.source.set_history("BTC", flat_history(3, 10, 5)).await;
    h.source.push_prices("BTC", &[100, 90, 90, 95]).await;
    h.notifier.set_failing(true);

    h.orchestrator.run_cycle(at(today(), 13, 0)).await;
    let report = h.orchestrator.run_cycle(at(today(), 13, 1)).await;
    let r = processed(report.status(&btc));
    assert_eq!(r.event, BreachEvent::LowBreach);
    assert!(matches!(r.delivery, Delivery::Failed(_)));
    assert!(logs_contain("alert delivery failed"));

    // The breach row is the new watermark even though nobody was told.
    let wm = h.store.today_watermark(&btc, today()).await.unwrap().unwrap();
    assert_eq!(wm.low(), Decimal::from(90));

    h.notifier.set_failing(false);
    let report = h.orchestrator.run_cycle(at(today(), 13, 2)).await;
    assert_eq!(processed(report.status(&btc)).event, BreachEvent::NoEvent);
    let report = h.orchestrator.run_cycle(at(today(), 13, 3)).await;
    assert_eq!(processed(report.status(&btc)).event, BreachEvent::NoEvent);
    assert!(h.notifier.sent().await.is_empty());
}

#[tokio::test]
async fn new_trading_day_resets_watermark() {
    let h = harness(&["BTC"], Duration::from_secs(2)).await;
    let btc = sym("BTC");
    let tomorrow = today().checked_add_days(Days::new(1)).unwrap();

    h.source.set_history("BTC", flat_history(3, 10, 5)).await;
    h.source.push_prices("BTC", &[100, 120, 90, 95]).await;

    h.orchestrator.run_cycle(at(today(), 22, 0)).await;
    h.orchestrator.run_cycle(at(today(), 23, 59)).await;

    // 00:00 KST is the boundary, whatever the host timezone says.
    let report = h.orchestrator.run_cycle(at(tomorrow, 0, 0)).await;
    let r = processed(report.status(&btc));
    assert_eq!(r.event, BreachEvent::NoEvent, "opening sample never alerts");
    assert_eq!(r.watermark.high(), Decimal::from(90));
    assert_eq!(r.watermark.low(), Decimal::from(90));

    let report = h.orchestrator.run_cycle(at(tomorrow, 0, 1)).await;
    assert_eq!(processed(report.status(&btc)).event, BreachEvent::HighBreach);
}

#[tokio::test]
async fn overlapping_trigger_skips_busy_symbol() {
    let h = harness(&["BTC"], Duration::from_secs(5)).await;
    let btc = sym("BTC");

    h.source.set_history("BTC", flat_history(3, 10, 5)).await;
    h.source.push_prices("BTC", &[100, 101]).await;
    let (entered, release) = h.source.hold("BTC").await;

    let o = h.orchestrator.clone();
    let slow = tokio::spawn(async move { o.run_cycle(at(today(), 14, 0)).await });

    entered.notified().await;
    let overlapping = h.orchestrator.run_cycle(at(today(), 14, 1)).await;
    assert!(matches!(overlapping.status(&btc), Some(SymbolStatus::Skipped)));

    release.notify_one();
    let first = slow.await.unwrap();
    assert_eq!(processed(first.status(&btc)).price, Decimal::from(100));

    // The skipped trigger was dropped, not queued.
    assert_eq!(h.store.record_count(&btc).await.unwrap(), 4);

    let next = h.orchestrator.run_cycle(at(today(), 14, 2)).await;
    assert_eq!(processed(next.status(&btc)).price, Decimal::from(101));
}

#[tokio::test]
async fn slow_source_is_bounded_by_timeout() {
    let h = harness(&["BTC", "ETH"], Duration::from_millis(200)).await;
    let btc = sym("BTC");
    let eth = sym("ETH");

    h.source.set_history("BTC", flat_history(3, 10, 5)).await;
    h.source.set_history("ETH", flat_history(3, 10, 5)).await;
    h.source.delay_prices("BTC", Duration::from_secs(30)).await;
    h.source.push_prices("BTC", &[100]).await;
    h.source.push_prices("ETH", &[100]).await;

    let started = Instant::now();
    let report = h.orchestrator.run_cycle(at(today(), 15, 0)).await;
    assert!(started.elapsed() < Duration::from_secs(10));

    match report.status(&btc) {
        Some(SymbolStatus::Failed(MonitorError::SourceUnavailable { reason, .. })) => {
            assert!(reason.contains("timed out"));
        }
        other => panic!("expected timeout failure, got {other:?}"),
    }
    assert!(matches!(report.status(&eth), Some(SymbolStatus::Processed(_))));
    assert_eq!(h.store.record_count(&btc).await.unwrap(), 3);
}

#[tokio::test]
async fn stalled_notifier_is_bounded_by_timeout() {
    let h = harness(&["BTC"], Duration::from_millis(200)).await;
    let btc = sym("BTC");

    h.source.set_history("BTC", flat_history(3, 10, 5)).await;
    h.source.push_prices("BTC", &[100, 101]).await;
    h.notifier.set_delay(Duration::from_secs(30)).await;

    h.orchestrator.run_cycle(at(today(), 16, 0)).await;
    let report = h.orchestrator.run_cycle(at(today(), 16, 1)).await;
    let r = processed(report.status(&btc));
    assert_eq!(r.event, BreachEvent::HighBreach);
    assert!(matches!(&r.delivery, Delivery::Failed(reason) if reason.contains("timed out")));
}

#[tokio::test]
async fn clock_stepping_back_does_not_realert() {
    let h = harness(&["BTC"], Duration::from_secs(2)).await;
    let btc = sym("BTC");

    h.source.set_history("BTC", flat_history(3, 10, 5)).await;
    h.source.push_prices("BTC", &[100, 90, 90]).await;

    let mut events = Vec::new();
    for minute in [5, 4, 6] {
        let report = h.orchestrator.run_cycle(at(today(), 10, minute)).await;
        events.push(processed(report.status(&btc)).event);
    }

    assert_eq!(
        events,
        vec![BreachEvent::NoEvent, BreachEvent::LowBreach, BreachEvent::NoEvent]
    );
    assert_eq!(h.notifier.sent().await.len(), 1);

    let wm = h.store.today_watermark(&btc, today()).await.unwrap().unwrap();
    assert_eq!(wm.high(), Decimal::from(100));
    assert_eq!(wm.low(), Decimal::from(90));
}

#[tokio::test]
async fn panicking_symbol_is_aborted_and_recovers() {
    let h = harness(&["BTC", "ETH"], Duration::from_secs(2)).await;
    let btc = sym("BTC");
    let eth = sym("ETH");

    h.source.set_history("BTC", flat_history(3, 10, 5)).await;
    h.source.set_history("ETH", flat_history(3, 10, 5)).await;
    h.source.panic_prices("BTC").await;
    h.source.push_prices("BTC", &[100]).await;
    h.source.push_prices("ETH", &[100]).await;

    let report = h.orchestrator.run_cycle(at(today(), 17, 0)).await;
    assert!(matches!(report.status(&btc), Some(SymbolStatus::Aborted(_))));
    assert!(matches!(report.status(&eth), Some(SymbolStatus::Processed(_))));
    assert_eq!(report.processed(), 1);

    // The in-flight claim was released while unwinding.
    let report = h.orchestrator.run_cycle(at(today(), 17, 1)).await;
    assert_eq!(processed(report.status(&btc)).price, Decimal::from(100));
}
