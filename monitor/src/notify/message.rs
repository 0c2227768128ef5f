use std::fmt::Write;

use rust_decimal::Decimal;

use crate::notify::{Alert, AlertKind};

/// Renders the Telegram (HTML) body for `alert`. `unit` is appended to
/// every price, e.g. `KRW`.
pub fn render(alert: &Alert, unit: &str) -> String {
    let headline = match alert.kind {
        AlertKind::NewHigh => "🟥 Intraday high broken",
        AlertKind::NewLow => "🟦 Intraday low broken",
    };

    let mut out = String::new();
    let _ = writeln!(out, "<b>{headline}</b>");
    let _ = writeln!(out, "<b>Symbol: {}</b>", alert.symbol);
    let _ = writeln!(out, "Price: {} {unit}", format_price(alert.current_price));

    for (days, high) in alert.highs.iter() {
        match high {
            Some(h) => {
                let _ = writeln!(out, "{days}-day high: {} {unit}", format_price(h));
            }
            None => {
                let _ = writeln!(out, "{days}-day high: N/A");
            }
        }
    }

    let _ = write!(out, "\n{}", alert.at.format("%Y-%m-%d %H:%M:%S"));
    out
}

/// Whole units with thousands separators for prices of 100 and above;
/// smaller prices keep up to four decimals so cheap coins stay readable.
pub fn format_price(price: Decimal) -> String {
    if price.abs() < Decimal::ONE_HUNDRED {
        return price.round_dp(4).normalize().to_string();
    }

    let whole = price.round_dp(0).normalize().to_string();
    let (sign, digits) = match whole.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", whole.as_str()),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{sign}{grouped}")
}
