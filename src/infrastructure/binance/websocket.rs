use super::common::{URL_STREAM_LIMIT, parse_stream_kline};
use crate::domain::market::CandleUpdate;
use crate::domain::ports::CandleCallback;
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

const MAX_BACKOFF_SECS: u64 = 60;
const PING_INTERVAL: Duration = Duration::from_secs(180);
const SUBSCRIBE_BATCH_SIZE: usize = 50;
const SUBSCRIBE_BATCH_DELAY: Duration = Duration::from_millis(300);

/// One combined kline stream connection, reconnecting until its task is aborted.
///
/// Everything (reads, pongs, keepalive pings) runs inside the task, so aborting it closes
/// the socket.
pub struct BinanceKlineStream {
    ws_url: String,
    streams: Vec<String>,
    on_update: CandleCallback,
}

impl BinanceKlineStream {
    pub fn new(ws_url: String, streams: Vec<String>, on_update: CandleCallback) -> Self {
        Self {
            ws_url,
            streams,
            on_update,
        }
    }

    /// Combined endpoint; stream names go in the query below `URL_STREAM_LIMIT`
    fn stream_url(&self) -> String {
        let mut url = format!("{}/stream", self.ws_url.trim_end_matches('/'));
        if self.streams.len() < URL_STREAM_LIMIT {
            url.push_str("?streams=");
            url.push_str(&self.streams.join("/"));
        }
        url
    }

    pub async fn run(self) {
        let mut backoff = 1;

        loop {
            match self.connect_and_stream().await {
                Ok(()) => {
                    info!("BinanceKlineStream: Connection closed, reconnecting");
                    // Avoid a tight loop when the server keeps closing on us
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    backoff = 1;
                }
                Err(e) => {
                    error!(
                        "BinanceKlineStream: {:#}. Reconnecting in {}s...",
                        e, backoff
                    );
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
                }
            }
        }
    }

    async fn connect_and_stream(&self) -> Result<()> {
        let url = self.stream_url();
        info!(
            "BinanceKlineStream: Connecting for {} streams",
            self.streams.len()
        );

        let (ws_stream, _) = connect_async(&url)
            .await
            .context("Failed to connect to Binance WebSocket")?;
        info!("BinanceKlineStream: Connected");

        let (mut write, mut read) = ws_stream.split();

        if self.streams.len() >= URL_STREAM_LIMIT {
            for (i, chunk) in self.streams.chunks(SUBSCRIBE_BATCH_SIZE).enumerate() {
                let subscribe_msg = serde_json::json!({
                    "method": "SUBSCRIBE",
                    "params": chunk,
                    "id": i + 1
                });
                debug!(
                    "BinanceKlineStream: Sending subscription batch of {} streams",
                    chunk.len()
                );
                write
                    .send(Message::Text(subscribe_msg.to_string().into()))
                    .await
                    .context("Failed to send subscription batch")?;
                tokio::time::sleep(SUBSCRIBE_BATCH_DELAY).await;
            }
        }

        let mut keepalive = tokio::time::interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);

        loop {
            tokio::select! {
                _ = keepalive.tick() => {
                    write
                        .send(Message::Ping(Vec::new().into()))
                        .await
                        .context("Failed to send keepalive ping")?;
                }
                msg = read.next() => match msg {
                    None => break,
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = self.handle_message(&text) {
                            warn!("BinanceKlineStream: Failed to handle message: {:#}", e);
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        debug!("BinanceKlineStream: Received ping");
                        write
                            .send(Message::Pong(payload))
                            .await
                            .context("Failed to answer ping")?;
                    }
                    Some(Ok(Message::Pong(_))) => debug!("BinanceKlineStream: Received pong"),
                    Some(Ok(Message::Close(frame))) => {
                        match frame {
                            Some(cf) => info!(
                                "BinanceKlineStream: Closed by server: Code {} Reason '{}'",
                                cf.code, cf.reason
                            ),
                            None => info!("BinanceKlineStream: Closed by server"),
                        }
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e).context("Binance WebSocket read error"),
                },
            }
        }

        Ok(())
    }

    fn handle_message(&self, text: &str) -> Result<()> {
        if let Some(candle) = parse_stream_kline(text)? {
            (self.on_update)(CandleUpdate::new(candle));
        }
        Ok(())
    }
}
