use crate::domain::market::Timeframe;
use crate::domain::ports::{CandleCallback, MarketDataService, SubscriptionHandle};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Owns the single live stream subscription.
///
/// The async mutex is held for the whole teardown-then-subscribe sequence, so concurrent
/// `resubscribe` calls queue up instead of racing to open two streams.
pub struct SubscriptionController {
    market: Arc<dyn MarketDataService>,
    timeframe: Timeframe,
    resubscribe_delay: Duration,
    active: Mutex<Option<SubscriptionHandle>>,
}

impl SubscriptionController {
    pub fn new(
        market: Arc<dyn MarketDataService>,
        timeframe: Timeframe,
        resubscribe_delay: Duration,
    ) -> Self {
        Self {
            market,
            timeframe,
            resubscribe_delay,
            active: Mutex::new(None),
        }
    }

    /// Replaces the live subscription with one covering `symbols`.
    ///
    /// An empty list only tears down. On error nothing is left subscribed.
    pub async fn resubscribe(&self, symbols: Vec<String>, on_update: CandleCallback) -> Result<()> {
        let mut active = self.active.lock().await;

        let had_previous = match active.take() {
            Some(previous) => {
                debug!(
                    "SubscriptionController: Closing subscription {} ({} symbols)",
                    previous.id,
                    previous.symbols.len()
                );
                self.market.unsubscribe(previous).await;
                true
            }
            None => false,
        };

        if symbols.is_empty() {
            info!("SubscriptionController: Symbol list empty, no active subscription");
            return Ok(());
        }

        if had_previous && !self.resubscribe_delay.is_zero() {
            tokio::time::sleep(self.resubscribe_delay).await;
        }

        let count = symbols.len();
        let handle = self
            .market
            .subscribe(symbols, self.timeframe, on_update)
            .await
            .with_context(|| format!("Failed to subscribe to {} symbols", count))?;

        info!(
            "SubscriptionController: Subscribed to {} symbols ({})",
            handle.symbols.len(),
            self.timeframe
        );
        *active = Some(handle);
        Ok(())
    }

    /// Tears down the live subscription, if any
    pub async fn shutdown(&self) {
        if let Some(handle) = self.active.lock().await.take() {
            info!("SubscriptionController: Closing subscription {}", handle.id);
            self.market.unsubscribe(handle).await;
        }
    }

    pub async fn has_active(&self) -> bool {
        self.active.lock().await.is_some()
    }

    pub async fn active_symbols(&self) -> Vec<String> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|handle| handle.symbols.clone())
            .unwrap_or_default()
    }
}
