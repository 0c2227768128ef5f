use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::model::Symbol;

/// Symbols with a cycle currently running. At most one cycle per symbol may
/// read-then-write its history at a time.
#[derive(Clone, Default)]
pub struct InFlight {
    inner: Arc<Mutex<HashSet<Symbol>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `symbol`, or returns `None` when another cycle holds it.
    /// The claim is released when the guard drops, including on task abort.
    pub fn try_acquire(&self, symbol: &Symbol) -> Option<InFlightGuard> {
        let mut set = self.inner.lock();
        if !set.insert(symbol.clone()) {
            return None;
        }
        Some(InFlightGuard {
            inner: Arc::clone(&self.inner),
            symbol: symbol.clone(),
        })
    }

    pub fn is_running(&self, symbol: &Symbol) -> bool {
        self.inner.lock().contains(symbol)
    }
}

pub struct InFlightGuard {
    inner: Arc<Mutex<HashSet<Symbol>>>,
    symbol: Symbol,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.lock().remove(&self.symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_refused_until_release() {
        let flights = InFlight::new();
        let btc = Symbol::parse("BTC").unwrap();

        let guard = flights.try_acquire(&btc).expect("first claim");
        assert!(flights.is_running(&btc));
        assert!(flights.try_acquire(&btc).is_none());

        drop(guard);
        assert!(!flights.is_running(&btc));
        assert!(flights.try_acquire(&btc).is_some());
    }

    #[test]
    fn symbols_are_independent() {
        let flights = InFlight::new();
        let _btc = flights.try_acquire(&Symbol::parse("BTC").unwrap()).unwrap();
        assert!(flights.try_acquire(&Symbol::parse("ETH").unwrap()).is_some());
    }
}
