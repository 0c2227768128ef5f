use tracing::Span;

use super::TraceId;

/// Root span for one polling cycle.
pub fn cycle_span(trace_id: &TraceId, symbols: usize) -> Span {
    tracing::info_span!(
        "cycle",
        trace_id = %trace_id,
        symbols
    )
}

/// Child span for a single symbol inside a cycle. Inherits the trace id
/// from the enclosing cycle span.
pub fn symbol_span(symbol: &str) -> Span {
    tracing::info_span!("symbol", symbol = %symbol)
}
