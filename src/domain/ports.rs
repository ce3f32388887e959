use crate::domain::market::{Candle, CandleUpdate, Timeframe};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Invoked by the provider for every streamed kline.
///
/// Runs on the provider's delivery task: implementations must hand the update off and return.
pub type CandleCallback = Arc<dyn Fn(CandleUpdate) + Send + Sync>;

/// Opaque handle to one live stream subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: u64,
    pub symbols: Vec<String>,
    pub timeframe: Timeframe,
}

#[async_trait]
pub trait MarketDataService: Send + Sync {
    /// Most recent `limit` klines, oldest first. An empty vector means the symbol has no data.
    async fn get_historical_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>>;

    /// Rolling 24h traded volume in quote asset (USDT)
    async fn get_24h_volume(&self, symbol: &str) -> Result<Decimal>;

    async fn subscribe(
        &self,
        symbols: Vec<String>,
        timeframe: Timeframe,
        on_update: CandleCallback,
    ) -> Result<SubscriptionHandle>;

    /// Stops delivery for `handle`. Unknown or already closed handles are ignored.
    async fn unsubscribe(&self, handle: SubscriptionHandle);
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one pre-formatted message
    async fn send(&self, message: &str) -> Result<()>;

    /// Reachability probe used at startup
    async fn test_connection(&self) -> Result<()>;
}
