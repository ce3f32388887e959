use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One fixed-interval OHLCV summary for a symbol.
///
/// Timestamps are Unix milliseconds. `is_closed` flips to true once the interval has
/// elapsed; from then on the candle never changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub open_time: i64,
    pub close_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub quote_volume: Decimal,
    pub is_closed: bool,
}

/// A streamed kline as delivered by the market data provider
#[derive(Debug, Clone, PartialEq)]
pub struct CandleUpdate {
    pub symbol: String,
    pub candle: Candle,
    pub is_final: bool,
}

impl CandleUpdate {
    pub fn new(candle: Candle) -> Self {
        Self {
            symbol: candle.symbol.clone(),
            is_final: candle.is_closed,
            candle,
        }
    }
}

/// Normalizes user/provider supplied symbols to the canonical upper-case form ("BTCUSDT")
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
