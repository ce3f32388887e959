//! Binance USD-M futures wire formats: kline arrays, stream payloads and error bodies

use crate::domain::errors::MarketDataError;
use crate::domain::market::{Candle, Timeframe, normalize_symbol};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

/// Combined-stream names switch to JSON `SUBSCRIBE` batches at this count
pub const URL_STREAM_LIMIT: usize = 50;

const INVALID_SYMBOL: i64 = -1121;
const INVALID_API_KEY: i64 = -2014;
const REJECTED_API_KEY: i64 = -2015;

/// `btcusdt@kline_1m`
pub fn kline_stream_name(symbol: &str, timeframe: Timeframe) -> String {
    format!(
        "{}@kline_{}",
        normalize_symbol(symbol).to_lowercase(),
        timeframe.to_binance_string()
    )
}

fn decimal_field(value: &serde_json::Value, field: &str) -> Result<Decimal> {
    let raw = value
        .as_str()
        .with_context(|| format!("{} is not a string", field))?;
    Decimal::from_str(raw).with_context(|| format!("{} is not a decimal: {}", field, raw))
}

fn time_field(value: &serde_json::Value, field: &str) -> Result<i64> {
    value
        .as_i64()
        .with_context(|| format!("{} is not an integer", field))
}

/// Parses one REST kline row:
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume, ...]`
pub fn parse_kline_row(symbol: &str, row: &serde_json::Value, now_ms: i64) -> Result<Candle> {
    let fields = row.as_array().context("kline row is not an array")?;
    if fields.len() < 8 {
        anyhow::bail!("kline row has {} fields, expected at least 8", fields.len());
    }

    let close_time = time_field(&fields[6], "closeTime")?;
    Ok(Candle {
        symbol: normalize_symbol(symbol),
        open_time: time_field(&fields[0], "openTime")?,
        close_time,
        open: decimal_field(&fields[1], "open")?,
        high: decimal_field(&fields[2], "high")?,
        low: decimal_field(&fields[3], "low")?,
        close: decimal_field(&fields[4], "close")?,
        volume: decimal_field(&fields[5], "volume")?,
        quote_volume: decimal_field(&fields[7], "quoteVolume")?,
        is_closed: close_time < now_ms,
    })
}

#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    stream: String,
    data: KlineEvent,
}

#[derive(Debug, Deserialize)]
struct KlineEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "k")]
    kline: KlinePayload,
}

#[derive(Debug, Deserialize)]
struct KlinePayload {
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "T")]
    close_time: i64,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "q")]
    quote_volume: String,
    #[serde(rename = "x")]
    is_closed: bool,
}

/// Parses a combined-stream text frame.
///
/// Returns `Ok(None)` for frames that are not kline events (subscription acks).
pub fn parse_stream_kline(text: &str) -> Result<Option<Candle>> {
    let value: serde_json::Value =
        serde_json::from_str(text).context("Stream frame is not JSON")?;
    if value.get("stream").is_none() {
        return Ok(None);
    }

    let envelope: StreamEnvelope =
        serde_json::from_value(value).context("Unexpected stream payload")?;
    if !envelope.stream.contains("@kline_") {
        return Ok(None);
    }

    let k = envelope.data.kline;
    let parse = |raw: &str, field: &str| {
        Decimal::from_str(raw).with_context(|| format!("{} is not a decimal: {}", field, raw))
    };

    Ok(Some(Candle {
        symbol: normalize_symbol(&envelope.data.symbol),
        open_time: k.open_time,
        close_time: k.close_time,
        open: parse(&k.open, "o")?,
        high: parse(&k.high, "h")?,
        low: parse(&k.low, "l")?,
        close: parse(&k.close, "c")?,
        volume: parse(&k.volume, "v")?,
        quote_volume: parse(&k.quote_volume, "q")?,
        is_closed: k.is_closed,
    }))
}

/// Maps a non-success REST response onto the provider error taxonomy
pub fn classify_error(status: u16, body: &str, symbol: &str) -> MarketDataError {
    #[derive(Deserialize)]
    struct ApiError {
        code: i64,
        msg: String,
    }

    let api_error = serde_json::from_str::<ApiError>(body).ok();
    let message = api_error
        .as_ref()
        .map(|e| e.msg.clone())
        .unwrap_or_else(|| body.trim().to_string());
    let code = api_error.as_ref().map(|e| e.code);

    match (status, code) {
        (_, Some(INVALID_SYMBOL)) => MarketDataError::SymbolNotFound {
            symbol: normalize_symbol(symbol),
        },
        (401 | 403, _) | (_, Some(INVALID_API_KEY | REJECTED_API_KEY)) => {
            MarketDataError::Unauthorized { reason: message }
        }
        (418 | 429, _) => MarketDataError::RateLimited { status },
        _ => MarketDataError::Api { status, message },
    }
}
