//! Binance USD-M Futures Market Data Service
//!
//! - Historical klines (`/fapi/v1/klines`) for seeding
//! - Rolling 24h quote volume (`/fapi/v1/ticker/24hr`) for the volume gate
//! - Combined kline streams, one reconnecting task per subscription handle

use super::common::{classify_error, kline_stream_name, parse_kline_row};
use super::websocket::BinanceKlineStream;
use crate::domain::market::{Candle, Timeframe, normalize_symbol};
use crate::domain::ports::{CandleCallback, MarketDataService, SubscriptionHandle};
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, build_url_with_query};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Binance caps a single klines request at 1500 rows
const MAX_KLINES_PER_REQUEST: usize = 1500;

pub struct BinanceMarketDataService {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
    ws_url: String,
    streams: Mutex<HashMap<u64, JoinHandle<()>>>,
    next_handle_id: AtomicU64,
}

impl BinanceMarketDataService {
    pub fn builder() -> BinanceMarketDataServiceBuilder {
        BinanceMarketDataServiceBuilder::default()
    }

    fn get(&self, url: &str) -> reqwest_middleware::RequestBuilder {
        let request = self.client.get(url);
        if self.api_key.is_empty() {
            request
        } else {
            request.header("X-MBX-APIKEY", &self.api_key)
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        symbol: &str,
        what: &str,
    ) -> Result<T> {
        let response = self
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {} for {} from Binance", what, symbol))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body, symbol))
                .with_context(|| format!("Binance {} request failed for {}", what, symbol));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse Binance {} response for {}", what, symbol))
    }

    /// Number of live stream tasks
    pub fn active_streams(&self) -> usize {
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for BinanceMarketDataService {
    fn drop(&mut self) {
        let streams = self.streams.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, task) in streams.drain() {
            task.abort();
        }
    }
}

#[derive(Default)]
pub struct BinanceMarketDataServiceBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    ws_url: Option<String>,
}

impl BinanceMarketDataServiceBuilder {
    pub fn api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn ws_url(mut self, ws_url: String) -> Self {
        self.ws_url = Some(ws_url);
        self
    }

    pub fn build(self) -> Result<BinanceMarketDataService> {
        let Some(base_url) = self.base_url else {
            bail!("base_url is required");
        };
        let Some(ws_url) = self.ws_url else {
            bail!("ws_url is required");
        };

        Ok(BinanceMarketDataService {
            client: HttpClientFactory::create_client(),
            api_key: self.api_key.unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            ws_url: ws_url.trim_end_matches('/').to_string(),
            streams: Mutex::new(HashMap::new()),
            next_handle_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl MarketDataService for BinanceMarketDataService {
    async fn get_historical_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let symbol = normalize_symbol(symbol);
        let limit = limit.clamp(1, MAX_KLINES_PER_REQUEST).to_string();
        let url = build_url_with_query(
            &format!("{}/fapi/v1/klines", self.base_url),
            &[
                ("symbol", symbol.as_str()),
                ("interval", timeframe.to_binance_string()),
                ("limit", limit.as_str()),
            ],
        )?;

        let rows: Vec<serde_json::Value> = self.fetch_json(&url, &symbol, "klines").await?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            match parse_kline_row(&symbol, row, now_ms) {
                Ok(candle) => candles.push(candle),
                Err(e) => warn!(
                    "BinanceMarketDataService: Skipping malformed kline for {}: {:#}",
                    symbol, e
                ),
            }
        }

        debug!(
            "BinanceMarketDataService: Fetched {} klines for {}",
            candles.len(),
            symbol
        );
        Ok(candles)
    }

    async fn get_24h_volume(&self, symbol: &str) -> Result<Decimal> {
        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Ticker24h {
            quote_volume: String,
        }

        let symbol = normalize_symbol(symbol);
        let url = build_url_with_query(
            &format!("{}/fapi/v1/ticker/24hr", self.base_url),
            &[("symbol", symbol.as_str())],
        )?;

        let ticker: Ticker24h = self.fetch_json(&url, &symbol, "24h ticker").await?;
        Decimal::from_str(&ticker.quote_volume).with_context(|| {
            format!(
                "Invalid quoteVolume '{}' for {}",
                ticker.quote_volume, symbol
            )
        })
    }

    async fn subscribe(
        &self,
        symbols: Vec<String>,
        timeframe: Timeframe,
        on_update: CandleCallback,
    ) -> Result<SubscriptionHandle> {
        let symbols: Vec<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
        if symbols.is_empty() {
            bail!("Cannot subscribe to an empty symbol list");
        }

        let streams = symbols
            .iter()
            .map(|s| kline_stream_name(s, timeframe))
            .collect();
        let stream = BinanceKlineStream::new(self.ws_url.clone(), streams, on_update);

        let id = self.next_handle_id.fetch_add(1, Ordering::SeqCst);
        let task = tokio::spawn(stream.run());
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, task);

        info!(
            "BinanceMarketDataService: Stream {} started for {} symbols ({})",
            id,
            symbols.len(),
            timeframe
        );
        Ok(SubscriptionHandle {
            id,
            symbols,
            timeframe,
        })
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) {
        let task = self
            .streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id);

        match task {
            Some(task) => {
                task.abort();
                // The stream may be mid-poll; wait until it can no longer deliver updates
                match task.await {
                    Err(e) if !e.is_cancelled() => warn!(
                        "BinanceMarketDataService: Stream {} ended abnormally: {}",
                        handle.id, e
                    ),
                    _ => {}
                }
                info!("BinanceMarketDataService: Stream {} stopped", handle.id);
            }
            None => debug!(
                "BinanceMarketDataService: Stream {} already stopped",
                handle.id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn service() -> BinanceMarketDataService {
        BinanceMarketDataService::builder()
            .base_url("https://fapi.binance.com/".to_string())
            .ws_url("ws://127.0.0.1:9".to_string())
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_urls() {
        assert!(BinanceMarketDataService::builder().build().is_err());
        assert!(
            BinanceMarketDataService::builder()
                .base_url("https://fapi.binance.com".to_string())
                .build()
                .is_err()
        );
        assert_eq!(service().base_url, "https://fapi.binance.com");
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_stream_task() {
        let service = service();
        let callback: CandleCallback = Arc::new(|_| {});

        assert!(
            service
                .subscribe(vec![], Timeframe::OneMin, callback.clone())
                .await
                .is_err()
        );

        let handle = service
            .subscribe(vec!["btcusdt".to_string()], Timeframe::OneMin, callback.clone())
            .await
            .unwrap();
        assert_eq!(handle.symbols, vec!["BTCUSDT"]);
        assert_eq!(service.active_streams(), 1);
        // The stream task holds the only other reference to the callback
        assert_eq!(Arc::strong_count(&callback), 2);

        service.unsubscribe(handle.clone()).await;
        assert_eq!(service.active_streams(), 0);
        assert_eq!(Arc::strong_count(&callback), 1);
        // Second teardown of the same handle is harmless
        service.unsubscribe(handle).await;
    }
}
