//! One polling cycle across all monitored symbols.
//!
//! Per symbol: register/seed → poll → read today's watermark → decide →
//! append → alert. Symbols run concurrently and fail independently; the
//! persisted record is the only watermark state, nothing is cached here.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use common::logger::{TraceId, cycle_span, symbol_span};
use rust_decimal::Decimal;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, warn};

use crate::bootstrap::Bootstrapper;
use crate::cycle::in_flight::InFlight;
use crate::error::MonitorError;
use crate::model::{BreachEvent, HIGH_WINDOWS, HistoricalHighs, Symbol, Watermark};
use crate::notify::{Alert, AlertKind, Notifier};
use crate::source::PriceSource;
use crate::store::InstrumentStore;
use crate::time::MarketClock;
use crate::watermark::{Sample, decide};

/// Outcome of the alert step for a processed symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// No breach, nothing to send.
    NotRequired,
    Sent,
    /// Logged and dropped; the price record stays.
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolReport {
    pub price: Decimal,
    pub event: BreachEvent,
    pub watermark: Watermark,
    pub bootstrapped: bool,
    pub delivery: Delivery,
}

#[derive(Debug)]
pub enum SymbolStatus {
    Processed(SymbolReport),
    /// A previous cycle for this symbol was still running.
    Skipped,
    Failed(MonitorError),
    /// The symbol task panicked or was cancelled.
    Aborted(String),
}

#[derive(Debug)]
pub struct CycleReport {
    pub trace_id: TraceId,
    /// In configured symbol order.
    pub statuses: Vec<(Symbol, SymbolStatus)>,
}

impl CycleReport {
    pub fn status(&self, symbol: &Symbol) -> Option<&SymbolStatus> {
        self.statuses
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, st)| st)
    }

    pub fn processed(&self) -> usize {
        self.statuses
            .iter()
            .filter(|(_, st)| matches!(st, SymbolStatus::Processed(_)))
            .count()
    }
}

pub struct CycleOrchestrator {
    symbols: Vec<Symbol>,
    store: Arc<dyn InstrumentStore>,
    source: Arc<dyn PriceSource>,
    notifier: Arc<dyn Notifier>,
    bootstrapper: Bootstrapper,
    clock: MarketClock,
    in_flight: InFlight,
    call_timeout: Duration,
}

impl CycleOrchestrator {
    pub fn new(
        symbols: Vec<Symbol>,
        store: Arc<dyn InstrumentStore>,
        source: Arc<dyn PriceSource>,
        notifier: Arc<dyn Notifier>,
        clock: MarketClock,
        history_days: u32,
        call_timeout: Duration,
    ) -> Self {
        let bootstrapper = Bootstrapper::new(
            Arc::clone(&store),
            Arc::clone(&source),
            clock,
            history_days,
            call_timeout,
        );

        Self {
            symbols,
            store,
            source,
            notifier,
            bootstrapper,
            clock,
            in_flight: InFlight::new(),
            call_timeout,
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Runs one pass over every symbol, sampled at `now`.
    pub async fn run_cycle(self: &Arc<Self>, now: DateTime<Utc>) -> CycleReport {
        let trace_id = TraceId::new();
        let span = cycle_span(&trace_id, self.symbols.len());

        async move {
            let mut tasks = JoinSet::new();
            for symbol in self.symbols.iter().cloned() {
                let this = Arc::clone(self);
                let span = symbol_span(symbol.as_str());
                tasks.spawn(
                    async move {
                        let status = this.run_symbol(&symbol, now).await;
                        (symbol, status)
                    }
                    .instrument(span),
                );
            }

            let mut done: HashMap<Symbol, SymbolStatus> = HashMap::new();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((symbol, status)) => {
                        done.insert(symbol, status);
                    }
                    Err(e) => error!(error = %e, "symbol task did not complete"),
                }
            }

            let statuses: Vec<(Symbol, SymbolStatus)> = self
                .symbols
                .iter()
                .map(|s| {
                    let st = done
                        .remove(s)
                        .unwrap_or_else(|| SymbolStatus::Aborted("task did not complete".into()));
                    (s.clone(), st)
                })
                .collect();

            let report = CycleReport { trace_id, statuses };
            info!(
                processed = report.processed(),
                total = report.statuses.len(),
                "cycle finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    async fn run_symbol(&self, symbol: &Symbol, now: DateTime<Utc>) -> SymbolStatus {
        let Some(_guard) = self.in_flight.try_acquire(symbol) else {
            warn!("previous cycle still running; skipping this trigger");
            return SymbolStatus::Skipped;
        };

        match self.process_symbol(symbol, now).await {
            Ok(report) => SymbolStatus::Processed(report),
            Err(e) => {
                error!(error = %e, kind = e.kind(), "symbol cycle failed");
                SymbolStatus::Failed(e)
            }
        }
    }

    /// Any error leaves previously persisted state untouched: the only write
    /// of a live sample happens after every fallible read succeeded.
    pub async fn process_symbol(
        &self,
        symbol: &Symbol,
        now: DateTime<Utc>,
    ) -> Result<SymbolReport, MonitorError> {
        let today = self.clock.trading_day(now);

        let created = self.store.ensure_table(symbol).await?;
        let needs_seed = created || self.store.record_count(symbol).await? == 0;
        let bootstrapped = if needs_seed {
            self.bootstrapper.bootstrap(symbol, today).await?
        } else {
            false
        };

        let price = bounded(self.call_timeout, self.source.current_price(symbol))
            .await
            .ok_or_else(|| {
                MonitorError::source_unavailable(
                    symbol.as_str(),
                    format!("price fetch timed out after {:?}", self.call_timeout),
                )
            })??;

        let current = self.store.today_watermark(symbol, today).await?;
        let sample = Sample {
            price,
            recorded_at: now,
            trading_day: today,
        };
        let decision = decide(&sample, current);

        self.store.insert(symbol, &decision.record(&sample)).await?;

        debug!(
            price = %price,
            high = %decision.watermark.high(),
            low = %decision.watermark.low(),
            event = %decision.event,
            "sample recorded"
        );

        let delivery = match AlertKind::from_event(decision.event) {
            None => Delivery::NotRequired,
            Some(kind) => {
                info!(
                    price = %price,
                    previous_high = ?current.map(|w| w.high()),
                    previous_low = ?current.map(|w| w.low()),
                    kind = %kind,
                    "intraday watermark broken"
                );
                self.send_alert(symbol, kind, price, today, now).await
            }
        };

        Ok(SymbolReport {
            price,
            event: decision.event,
            watermark: decision.watermark,
            bootstrapped,
            delivery,
        })
    }

    async fn send_alert(
        &self,
        symbol: &Symbol,
        kind: AlertKind,
        price: Decimal,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Delivery {
        let highs = match self
            .store
            .historical_highs(symbol, today, &HIGH_WINDOWS)
            .await
        {
            Ok(h) => h,
            Err(e) => {
                // The breach is already persisted and will not re-trigger,
                // so announce it without the window figures.
                warn!(error = %e, "historical highs unavailable; alerting without them");
                let mut empty = HistoricalHighs::default();
                for days in HIGH_WINDOWS {
                    empty.push(days, None);
                }
                empty
            }
        };

        let alert = Alert {
            symbol: symbol.clone(),
            kind,
            current_price: price,
            highs,
            at: self.clock.local(now),
        };

        let sent = bounded(self.call_timeout, self.notifier.notify(&alert))
            .await
            .unwrap_or_else(|| {
                Err(MonitorError::delivery_failed(
                    symbol.as_str(),
                    format!("timed out after {:?}", self.call_timeout),
                ))
            });

        match sent {
            Ok(()) => {
                info!("alert delivered");
                Delivery::Sent
            }
            Err(e) => {
                error!(error = %e, "alert delivery failed");
                Delivery::Failed(e.to_string())
            }
        }
    }
}

/// `None` when `fut` did not finish within `limit`.
async fn bounded<F, T>(limit: Duration, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut).await.ok()
}
