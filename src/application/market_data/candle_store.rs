use crate::domain::market::{
    Candle, CandleWindow, SymbolStatus, UpsertOutcome, normalize_symbol,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{error, warn};

#[derive(Debug, Default)]
struct StoreState {
    windows: HashMap<String, CandleWindow>,
    statuses: HashMap<String, SymbolStatus>,
}

/// Per-symbol candle windows plus the membership labels that go with them.
///
/// One mutex covers both maps so a symbol has a window exactly when it is labelled
/// `Eligible`. Every operation holds the lock for at most one window copy and never across
/// an await point.
pub struct CandleStore {
    capacity: usize,
    state: Mutex<StoreState>,
}

impl std::fmt::Debug for CandleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleStore")
            .field("capacity", &self.capacity)
            .field("state", &"<Mutex>")
            .finish()
    }
}

impl CandleStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("CandleStore: Lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Applies a streamed candle to an eligible symbol's window.
    ///
    /// Returns `None` when the symbol is not currently monitored.
    pub fn upsert(&self, symbol: &str, candle: Candle) -> Option<UpsertOutcome> {
        let symbol = normalize_symbol(symbol);
        let mut state = self.lock();
        state
            .windows
            .get_mut(&symbol)
            .map(|window| window.upsert(candle))
    }

    /// Ordered copy of a symbol's window
    pub fn snapshot(&self, symbol: &str) -> Option<Vec<Candle>> {
        let symbol = normalize_symbol(symbol);
        self.lock().windows.get(&symbol).map(CandleWindow::to_vec)
    }

    /// Installs a fresh window built from `candles` and labels the symbol eligible.
    ///
    /// Symbols already marked invalid stay invalid; returns false in that case.
    pub fn replace(&self, symbol: &str, candles: Vec<Candle>) -> bool {
        let symbol = normalize_symbol(symbol);
        let window = CandleWindow::from_history(self.capacity, candles);

        let mut state = self.lock();
        if state.statuses.get(&symbol) == Some(&SymbolStatus::Invalid) {
            warn!("CandleStore: Refusing to seed invalid symbol {}", symbol);
            return false;
        }
        state.windows.insert(symbol.clone(), window);
        state.statuses.insert(symbol, SymbolStatus::Eligible);
        true
    }

    /// Drops a symbol's window and labels it low-volume. Returns true if it was eligible.
    pub fn remove(&self, symbol: &str) -> bool {
        let symbol = normalize_symbol(symbol);
        let mut state = self.lock();
        if state.statuses.get(&symbol) == Some(&SymbolStatus::Invalid) {
            return false;
        }
        let existed = state.windows.remove(&symbol).is_some();
        state.statuses.insert(symbol, SymbolStatus::LowVolume);
        existed
    }

    /// Permanently excludes a symbol for this session
    pub fn mark_invalid(&self, symbol: &str) {
        let symbol = normalize_symbol(symbol);
        let mut state = self.lock();
        state.windows.remove(&symbol);
        state.statuses.insert(symbol, SymbolStatus::Invalid);
    }

    pub fn has_sufficient_history(&self, symbol: &str, min_length: usize) -> bool {
        let symbol = normalize_symbol(symbol);
        self.lock()
            .windows
            .get(&symbol)
            .is_some_and(|w| w.len() >= min_length)
    }

    /// Copies every window holding at least `min_length` candles, in one critical section
    pub fn ready_snapshots(&self, min_length: usize) -> Vec<(String, Vec<Candle>)> {
        let state = self.lock();
        let mut ready: Vec<(String, Vec<Candle>)> = state
            .windows
            .iter()
            .filter(|(_, window)| window.len() >= min_length)
            .map(|(symbol, window)| (symbol.clone(), window.to_vec()))
            .collect();
        drop(state);

        ready.sort_by(|a, b| a.0.cmp(&b.0));
        ready
    }

    pub fn ready_count(&self, min_length: usize) -> usize {
        self.lock()
            .windows
            .values()
            .filter(|w| w.len() >= min_length)
            .count()
    }

    /// Sorted list of monitored symbols
    pub fn eligible_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.lock().windows.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn eligible_count(&self) -> usize {
        self.lock().windows.len()
    }

    pub fn status(&self, symbol: &str) -> Option<SymbolStatus> {
        let symbol = normalize_symbol(symbol);
        self.lock().statuses.get(&symbol).copied()
    }

    /// Sorted symbols currently carrying `status`
    pub fn symbols_with_status(&self, status: SymbolStatus) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .lock()
            .statuses
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(symbol, _)| symbol.clone())
            .collect();
        symbols.sort();
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn candle(symbol: &str, open_time: i64, close: i64) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            open_time,
            close_time: open_time + 59_999,
            open: Decimal::from(close),
            high: Decimal::from(close),
            low: Decimal::from(close),
            close: Decimal::from(close),
            volume: Decimal::ONE,
            quote_volume: Decimal::from(close),
            is_closed: true,
        }
    }

    /// Windows and eligible labels must always describe the same set
    fn assert_consistent(store: &CandleStore) {
        let mut labelled = store.symbols_with_status(SymbolStatus::Eligible);
        labelled.sort();
        assert_eq!(store.eligible_symbols(), labelled);
    }

    #[test]
    fn test_upsert_ignores_unmonitored_symbols() {
        let store = CandleStore::new(3);
        assert_eq!(store.upsert("BTCUSDT", candle("BTCUSDT", 1, 1)), None);
        assert!(store.snapshot("BTCUSDT").is_none());
        assert_consistent(&store);
    }

    #[test]
    fn test_replace_then_stream_updates() {
        let store = CandleStore::new(3);
        assert!(store.replace("btcusdt", vec![candle("BTCUSDT", 1, 10), candle("BTCUSDT", 2, 11)]));

        assert_eq!(
            store.upsert("BTCUSDT", candle("BTCUSDT", 2, 12)),
            Some(UpsertOutcome::Replaced)
        );
        assert_eq!(
            store.upsert("BTCUSDT", candle("BTCUSDT", 3, 13)),
            Some(UpsertOutcome::Appended)
        );
        assert_eq!(
            store.upsert("BTCUSDT", candle("BTCUSDT", 4, 14)),
            Some(UpsertOutcome::Appended)
        );
        assert_eq!(
            store.upsert("BTCUSDT", candle("BTCUSDT", 1, 99)),
            Some(UpsertOutcome::Rejected)
        );

        let opens: Vec<i64> = store
            .snapshot("BTCUSDT")
            .unwrap()
            .iter()
            .map(|c| c.open_time)
            .collect();
        assert_eq!(opens, vec![2, 3, 4]);
        assert_consistent(&store);
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let store = CandleStore::new(5);
        store.replace("ETHUSDT", vec![candle("ETHUSDT", 1, 10)]);

        let snapshot = store.snapshot("ETHUSDT").unwrap();
        store.upsert("ETHUSDT", candle("ETHUSDT", 2, 11));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.snapshot("ETHUSDT").unwrap().len(), 2);
    }

    #[test]
    fn test_remove_labels_low_volume() {
        let store = CandleStore::new(5);
        store.replace("SOLUSDT", vec![candle("SOLUSDT", 1, 10)]);

        assert!(store.remove("SOLUSDT"));
        assert_eq!(store.status("SOLUSDT"), Some(SymbolStatus::LowVolume));
        assert!(store.snapshot("SOLUSDT").is_none());
        assert!(!store.remove("SOLUSDT"));
        assert_consistent(&store);
    }

    #[test]
    fn test_invalid_is_permanent() {
        let store = CandleStore::new(5);
        store.mark_invalid("DOGEUSDT");

        assert!(!store.replace("DOGEUSDT", vec![candle("DOGEUSDT", 1, 1)]));
        assert!(!store.remove("DOGEUSDT"));
        assert_eq!(store.status("DOGEUSDT"), Some(SymbolStatus::Invalid));
        assert_consistent(&store);
    }

    #[test]
    fn test_ready_snapshots_respects_min_length() {
        let store = CandleStore::new(50);
        store.replace(
            "BTCUSDT",
            (0..15).map(|t| candle("BTCUSDT", t, 100 + t)).collect(),
        );
        store.replace(
            "ETHUSDT",
            (0..10).map(|t| candle("ETHUSDT", t, 100 + t)).collect(),
        );

        let ready = store.ready_snapshots(15);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].0, "BTCUSDT");
        assert_eq!(store.ready_count(15), 1);
        assert!(store.has_sufficient_history("BTCUSDT", 15));
        assert!(!store.has_sufficient_history("ETHUSDT", 15));
    }

    #[test]
    fn test_concurrent_upserts_keep_bound() {
        let store = Arc::new(CandleStore::new(50));
        store.replace("BTCUSDT", vec![]);

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for t in 0..1000 {
                        store.upsert("BTCUSDT", candle("BTCUSDT", t * 4 + worker, t));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let window = store.snapshot("BTCUSDT").unwrap();
        assert!(window.len() <= 50);
        assert!(window.windows(2).all(|pair| pair[0].open_time < pair[1].open_time));
    }
}
