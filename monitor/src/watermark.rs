//! Intraday watermark decisions.
//!
//! Pure logic, no I/O. Given the latest persisted watermark for today (if
//! any) and a fresh sample, decide whether the sample breaks the watermark
//! and which high/low pair to persist alongside it.
//!
//! Deduplication falls out of the comparison: the persisted watermark only
//! ever moves in the breaching direction and comparisons are strict, so a
//! sample that re-touches or retreats from an extreme cannot alert again.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::model::{BreachEvent, PriceRecord, Watermark};

/// A freshly polled price, stamped with its trading day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sample {
    pub price: Decimal,
    pub recorded_at: DateTime<Utc>,
    pub trading_day: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub event: BreachEvent,
    pub watermark: Watermark,
}

impl Decision {
    /// The row to append for `sample` under this decision.
    pub fn record(&self, sample: &Sample) -> PriceRecord {
        PriceRecord {
            trade_price: sample.price,
            high_price: self.watermark.high(),
            low_price: self.watermark.low(),
            recorded_at: sample.recorded_at,
            trading_day: sample.trading_day,
        }
    }
}

/// `today` must only ever come from records of `sample.trading_day`; the
/// store guarantees that.
pub fn decide(sample: &Sample, today: Option<Watermark>) -> Decision {
    let price = sample.price;

    let Some(current) = today else {
        // Opening sample: nothing prior to exceed.
        return Decision {
            event: BreachEvent::NoEvent,
            watermark: Watermark::opening(price),
        };
    };

    if price > current.high() {
        Decision {
            event: BreachEvent::HighBreach,
            watermark: raised(current, price),
        }
    } else if price < current.low() {
        Decision {
            event: BreachEvent::LowBreach,
            watermark: lowered(current, price),
        }
    } else {
        Decision {
            event: BreachEvent::NoEvent,
            watermark: current,
        }
    }
}

fn raised(current: Watermark, price: Decimal) -> Watermark {
    // price > high >= low
    Watermark::new(price, current.low()).unwrap_or(current)
}

fn lowered(current: Watermark, price: Decimal) -> Watermark {
    // high >= low > price
    Watermark::new(current.high(), price).unwrap_or(current)
}
