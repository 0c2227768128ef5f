use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// Maps UTC instants onto trading days using a fixed, configured offset.
/// The host timezone is never consulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarketClock {
    offset: FixedOffset,
}

impl MarketClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset)
    }

    pub fn trading_day(&self, at: DateTime<Utc>) -> NaiveDate {
        self.local(at).date_naive()
    }

    /// Last second of `day` in market time, expressed in UTC. Used as the
    /// timestamp of bootstrap rows.
    pub fn end_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        let local = day.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN));
        // A fixed offset has no gaps or folds, so the mapping is unique.
        self.offset
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&local))
    }
}

/// First day of a trailing window of `days` calendar days ending on
/// `today` (inclusive). A zero-length window is treated as today only.
pub fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    let back = u64::from(days.saturating_sub(1));
    today.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN)
}

/// Parses `+HH:MM`, `-HH:MM`, `+HHMM`, `Z` or `UTC`.
pub fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    s.parse::<FixedOffset>().ok()
}
