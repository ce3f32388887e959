//! In-memory collaborators for tests and dry runs.
//!
//! `MockMarketDataService` serves scripted histories and volumes, records every subscription
//! change and lets callers push stream updates through the live callback.
//! `RecordingNotifier` keeps every message it is asked to send.

use crate::domain::errors::{MarketDataError, NotifierError};
use crate::domain::market::{Candle, CandleUpdate, Timeframe, normalize_symbol};
use crate::domain::ports::{CandleCallback, MarketDataService, Notifier, SubscriptionHandle};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Network style error, retried next cycle
    Transient,
    /// Rejected credentials
    Unauthorized,
    /// Exchange does not list the symbol
    UnknownSymbol,
}

impl MockFailure {
    fn to_error(self, symbol: &str) -> anyhow::Error {
        match self {
            MockFailure::Transient => anyhow::anyhow!("connection reset while fetching {}", symbol),
            MockFailure::Unauthorized => MarketDataError::Unauthorized {
                reason: "Invalid API-key, IP, or permissions for action".to_string(),
            }
            .into(),
            MockFailure::UnknownSymbol => MarketDataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }
            .into(),
        }
    }
}

#[derive(Default)]
pub struct MockMarketDataService {
    volumes: Mutex<HashMap<String, Decimal>>,
    volume_failures: Mutex<HashMap<String, MockFailure>>,
    histories: Mutex<HashMap<String, Vec<Candle>>>,
    history_failures: Mutex<HashMap<String, MockFailure>>,
    volume_requests: Mutex<Vec<String>>,
    history_requests: Mutex<Vec<String>>,
    subscribe_calls: Mutex<Vec<Vec<String>>>,
    unsubscribe_calls: Mutex<Vec<u64>>,
    active: Mutex<Option<(SubscriptionHandle, CandleCallback)>>,
    fail_subscribe: AtomicBool,
    next_id: AtomicU64,
}

impl MockMarketDataService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_volume(&self, symbol: &str, volume: Decimal) {
        let symbol = normalize_symbol(symbol);
        locked(&self.volume_failures).remove(&symbol);
        locked(&self.volumes).insert(symbol, volume);
    }

    pub fn fail_volume(&self, symbol: &str, failure: MockFailure) {
        locked(&self.volume_failures).insert(normalize_symbol(symbol), failure);
    }

    pub fn set_history(&self, symbol: &str, candles: Vec<Candle>) {
        let symbol = normalize_symbol(symbol);
        locked(&self.history_failures).remove(&symbol);
        locked(&self.histories).insert(symbol, candles);
    }

    pub fn fail_history(&self, symbol: &str, failure: MockFailure) {
        locked(&self.history_failures).insert(normalize_symbol(symbol), failure);
    }

    pub fn set_subscribe_failing(&self, failing: bool) {
        self.fail_subscribe.store(failing, Ordering::SeqCst);
    }

    /// Symbol lists of every successful `subscribe`, in call order
    pub fn subscribe_calls(&self) -> Vec<Vec<String>> {
        locked(&self.subscribe_calls).clone()
    }

    pub fn unsubscribe_count(&self) -> usize {
        locked(&self.unsubscribe_calls).len()
    }

    pub fn volume_requests(&self) -> Vec<String> {
        locked(&self.volume_requests).clone()
    }

    pub fn history_requests(&self) -> Vec<String> {
        locked(&self.history_requests).clone()
    }

    /// Symbols of the live subscription, if any
    pub fn active_symbols(&self) -> Option<Vec<String>> {
        locked(&self.active)
            .as_ref()
            .map(|(handle, _)| handle.symbols.clone())
    }

    /// Delivers `candle` through the live callback. Returns false when nothing is subscribed
    /// to its symbol.
    pub fn push_update(&self, candle: Candle) -> bool {
        let callback = {
            let active = locked(&self.active);
            match active.as_ref() {
                Some((handle, callback))
                    if handle.symbols.contains(&normalize_symbol(&candle.symbol)) =>
                {
                    callback.clone()
                }
                _ => return false,
            }
        };
        callback(CandleUpdate::new(candle));
        true
    }
}

#[async_trait]
impl MarketDataService for MockMarketDataService {
    async fn get_historical_candles(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let symbol = normalize_symbol(symbol);
        locked(&self.history_requests).push(symbol.clone());

        if let Some(failure) = locked(&self.history_failures).get(&symbol).copied() {
            return Err(failure.to_error(&symbol));
        }

        let history = locked(&self.histories)
            .get(&symbol)
            .cloned()
            .unwrap_or_default();
        let skip = history.len().saturating_sub(limit);
        Ok(history.into_iter().skip(skip).collect())
    }

    async fn get_24h_volume(&self, symbol: &str) -> Result<Decimal> {
        let symbol = normalize_symbol(symbol);
        locked(&self.volume_requests).push(symbol.clone());

        if let Some(failure) = locked(&self.volume_failures).get(&symbol).copied() {
            return Err(failure.to_error(&symbol));
        }

        locked(&self.volumes)
            .get(&symbol)
            .copied()
            .ok_or_else(|| MarketDataError::SymbolNotFound { symbol }.into())
    }

    async fn subscribe(
        &self,
        symbols: Vec<String>,
        timeframe: Timeframe,
        on_update: CandleCallback,
    ) -> Result<SubscriptionHandle> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            anyhow::bail!("stream connection refused");
        }

        let symbols: Vec<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
        let handle = SubscriptionHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            symbols: symbols.clone(),
            timeframe,
        };

        let mut active = locked(&self.active);
        if active.is_some() {
            anyhow::bail!("a subscription is already live");
        }
        *active = Some((handle.clone(), on_update));
        drop(active);

        locked(&self.subscribe_calls).push(symbols);
        debug!("MockMarketDataService: Subscription {} opened", handle.id);
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut active = locked(&self.active);
        if active.as_ref().is_some_and(|(live, _)| live.id == handle.id) {
            *active = None;
        }
        drop(active);
        locked(&self.unsubscribe_calls).push(handle.id);
    }
}

/// Notifier that keeps messages in memory
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    failing: AtomicBool,
    unreachable: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `send` fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Simulated transport latency per send
    pub fn set_delay(&self, delay: Option<Duration>) {
        *locked(&self.delay) = delay;
    }

    pub fn messages(&self) -> Vec<String> {
        locked(&self.messages).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let delay = *locked(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifierError::Rejected {
                reason: "recording notifier set to fail".to_string(),
            }
            .into());
        }
        locked(&self.messages).push(message.to_string());
        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            anyhow::bail!("recording notifier unreachable");
        }
        Ok(())
    }
}

/// Closed one-minute candles with the given closes, starting at open time 0
pub fn candle_series(symbol: &str, closes: &[Decimal]) -> Vec<Candle> {
    let minute = Timeframe::OneMin.to_millis();
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let open_time = i as i64 * minute;
            Candle {
                symbol: normalize_symbol(symbol),
                open_time,
                close_time: open_time + minute - 1,
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: Decimal::ONE,
                quote_volume: *close,
                is_closed: true,
            }
        })
        .collect()
}

/// `count` candles whose close rises by 1 each step from `start`
pub fn rising_series(symbol: &str, count: usize, start: i64) -> Vec<Candle> {
    let closes: Vec<Decimal> = (0..count as i64).map(|i| Decimal::from(start + i)).collect();
    candle_series(symbol, &closes)
}
