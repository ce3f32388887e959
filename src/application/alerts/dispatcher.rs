use super::message::format_alert;
use crate::application::indicators::{RsiReading, rsi};
use crate::application::market_data::VolumeCache;
use crate::domain::alerts::{AlertDirection, RsiAlert};
use crate::domain::config::RsiAlertConfig;
use crate::domain::market::{Candle, normalize_symbol};
use crate::domain::ports::Notifier;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info};

/// What one `evaluate` call did for a symbol
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    /// Window shorter than `period + 1`
    InsufficientData { required: usize, available: usize },
    /// Last alert is younger than the cooldown
    CoolingDown { remaining: Duration },
    /// Another evaluation for the same symbol is currently sending
    InFlight,
    /// RSI inside the band, nothing to send
    WithinBand(f64),
    Dispatched(RsiAlert),
    /// Notifier failed; cooldown not started
    SendFailed,
}

impl AlertOutcome {
    pub fn dispatched(&self) -> bool {
        matches!(self, AlertOutcome::Dispatched(_))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct AlertSlot {
    last_alert: Option<DateTime<Utc>>,
    in_flight: bool,
}

/// Threshold evaluation with a per-symbol cooldown.
///
/// A slot is claimed under the lock before the notifier is awaited and released afterwards,
/// so two concurrent evaluations of the same symbol can never both send. The timestamp is
/// recorded only after a successful send.
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    volumes: Arc<VolumeCache>,
    config: RsiAlertConfig,
    slots: Mutex<HashMap<String, AlertSlot>>,
}

impl AlertDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        volumes: Arc<VolumeCache>,
        config: RsiAlertConfig,
    ) -> Self {
        Self {
            notifier,
            volumes,
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RsiAlertConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, AlertSlot>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("AlertDispatcher: Lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Evaluates `window` now; returns true when an alert was sent
    pub async fn evaluate(&self, symbol: &str, window: &[Candle]) -> bool {
        self.evaluate_at(symbol, window, Utc::now())
            .await
            .dispatched()
    }

    pub async fn evaluate_at(
        &self,
        symbol: &str,
        window: &[Candle],
        now: DateTime<Utc>,
    ) -> AlertOutcome {
        let symbol = normalize_symbol(symbol);
        let required = self.config.min_history();
        if window.len() < required {
            return AlertOutcome::InsufficientData {
                required,
                available: window.len(),
            };
        }

        if let Some(remaining) = self.cooldown_remaining(&symbol, now) {
            return AlertOutcome::CoolingDown { remaining };
        }

        let value = match rsi(window, self.config.period) {
            RsiReading::Value(v) => v,
            RsiReading::InsufficientData {
                required,
                available,
            } => return AlertOutcome::InsufficientData { required, available },
        };

        let Some(direction) = AlertDirection::classify(
            value,
            self.config.upper_threshold,
            self.config.lower_threshold,
        ) else {
            return AlertOutcome::WithinBand(value);
        };

        if let Err(outcome) = self.claim(&symbol, now) {
            return outcome;
        }

        let Some(latest) = window.iter().max_by_key(|c| c.open_time) else {
            self.release(&symbol, None);
            return AlertOutcome::InsufficientData {
                required,
                available: 0,
            };
        };

        let alert = RsiAlert {
            symbol: symbol.clone(),
            direction,
            rsi: value,
            last_close: latest.close,
            volume_24h: self.volumes.get(&symbol),
            timestamp: now,
        };

        match self.notifier.send(&format_alert(&alert)).await {
            Ok(()) => {
                self.release(&symbol, Some(now));
                info!(
                    "AlertDispatcher: {} alert sent for {} (RSI {:.2})",
                    direction, symbol, value
                );
                AlertOutcome::Dispatched(alert)
            }
            Err(e) => {
                self.release(&symbol, None);
                error!(
                    "AlertDispatcher: Failed to send {} alert for {}: {:#}",
                    direction, symbol, e
                );
                AlertOutcome::SendFailed
            }
        }
    }

    /// Timestamp of the last successfully sent alert
    pub fn last_alert(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.lock()
            .get(&normalize_symbol(symbol))
            .and_then(|slot| slot.last_alert)
    }

    fn cooldown_remaining(&self, symbol: &str, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.lock().get(symbol).and_then(|slot| slot.last_alert)?;
        remaining(last, now, self.config.cooldown)
    }

    fn claim(&self, symbol: &str, now: DateTime<Utc>) -> Result<(), AlertOutcome> {
        let mut slots = self.lock();
        let slot = slots.entry(symbol.to_string()).or_default();

        if slot.in_flight {
            debug!("AlertDispatcher: Send already in flight for {}", symbol);
            return Err(AlertOutcome::InFlight);
        }
        if let Some(remaining) = slot
            .last_alert
            .and_then(|last| remaining(last, now, self.config.cooldown))
        {
            return Err(AlertOutcome::CoolingDown { remaining });
        }

        slot.in_flight = true;
        Ok(())
    }

    fn release(&self, symbol: &str, sent_at: Option<DateTime<Utc>>) {
        let mut slots = self.lock();
        let slot = slots.entry(symbol.to_string()).or_default();
        slot.in_flight = false;
        if sent_at.is_some() {
            slot.last_alert = sent_at;
        }
    }
}

fn remaining(last: DateTime<Utc>, now: DateTime<Utc>, cooldown: Duration) -> Option<Duration> {
    let cooldown = chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::MAX);
    let elapsed = now.signed_duration_since(last);
    if elapsed >= cooldown {
        return None;
    }
    (cooldown - elapsed).to_std().ok().or(Some(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::RecordingNotifier;
    use rust_decimal::Decimal;

    fn rising_window(len: usize) -> Vec<Candle> {
        (0..len)
            .map(|i| {
                let close = Decimal::from(100 + i as i64);
                Candle {
                    symbol: "BTCUSDT".to_string(),
                    open_time: i as i64 * 60_000,
                    close_time: i as i64 * 60_000 + 59_999,
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: Decimal::ONE,
                    quote_volume: close,
                    is_closed: true,
                }
            })
            .collect()
    }

    fn dispatcher(notifier: Arc<RecordingNotifier>) -> AlertDispatcher {
        AlertDispatcher::new(
            notifier,
            Arc::new(VolumeCache::new()),
            RsiAlertConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_rising_window_dispatches_overbought() {
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = dispatcher(notifier.clone());

        let outcome = dispatcher
            .evaluate_at("BTCUSDT", &rising_window(15), Utc::now())
            .await;

        let AlertOutcome::Dispatched(alert) = outcome else {
            panic!("expected dispatch, got {:?}", outcome);
        };
        assert_eq!(alert.direction, AlertDirection::Overbought);
        assert_eq!(alert.rsi, 100.0);
        assert_eq!(alert.last_close, Decimal::from(114));

        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Overbought"));
        assert!(messages[0].contains("BTCUSDT"));
    }

    #[tokio::test]
    async fn test_short_window_is_noop() {
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = dispatcher(notifier.clone());

        let outcome = dispatcher
            .evaluate_at("BTCUSDT", &rising_window(14), Utc::now())
            .await;
        assert_eq!(
            outcome,
            AlertOutcome::InsufficientData {
                required: 15,
                available: 14
            }
        );
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_repeats_until_elapsed() {
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = dispatcher(notifier.clone());
        let window = rising_window(20);
        let start = Utc::now();

        assert!(dispatcher.evaluate_at("BTCUSDT", &window, start).await.dispatched());
        for secs in [1, 60, 299] {
            let outcome = dispatcher
                .evaluate_at("BTCUSDT", &window, start + chrono::Duration::seconds(secs))
                .await;
            assert!(matches!(outcome, AlertOutcome::CoolingDown { .. }));
        }
        assert_eq!(notifier.messages().len(), 1);

        let later = start + chrono::Duration::seconds(300);
        assert!(dispatcher.evaluate_at("BTCUSDT", &window, later).await.dispatched());
        assert_eq!(notifier.messages().len(), 2);
        assert_eq!(dispatcher.last_alert("BTCUSDT"), Some(later));
    }

    #[tokio::test]
    async fn test_failed_send_does_not_start_cooldown() {
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.set_failing(true);
        let dispatcher = dispatcher(notifier.clone());
        let window = rising_window(15);
        let now = Utc::now();

        assert_eq!(
            dispatcher.evaluate_at("BTCUSDT", &window, now).await,
            AlertOutcome::SendFailed
        );
        assert_eq!(dispatcher.last_alert("BTCUSDT"), None);

        notifier.set_failing(false);
        assert!(dispatcher.evaluate_at("BTCUSDT", &window, now).await.dispatched());
    }

    #[tokio::test]
    async fn test_cooldown_is_per_symbol() {
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = dispatcher(notifier.clone());
        let window = rising_window(15);

        assert!(dispatcher.evaluate("BTCUSDT", &window).await);
        assert!(dispatcher.evaluate("ETHUSDT", &window).await);
        assert!(!dispatcher.evaluate("BTCUSDT", &window).await);
        assert_eq!(notifier.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_evaluations_send_once() {
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = Arc::new(dispatcher(notifier.clone()));
        let window = Arc::new(rising_window(15));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                let window = window.clone();
                tokio::spawn(async move { dispatcher.evaluate("BTCUSDT", &window).await })
            })
            .collect();

        let sent = futures::future::join_all(tasks)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(true)))
            .count();
        assert_eq!(sent, 1);
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_cached_volume_is_included() {
        let notifier = Arc::new(RecordingNotifier::new());
        let volumes = Arc::new(VolumeCache::new());
        volumes.update("BTCUSDT".to_string(), Decimal::from(30_000_000));
        let dispatcher = AlertDispatcher::new(
            notifier.clone(),
            volumes,
            RsiAlertConfig::default(),
        );

        dispatcher.evaluate("BTCUSDT", &rising_window(15)).await;
        assert!(notifier.messages()[0].contains("$30,000,000 USDT"));
    }
}
