//! Relative Strength Index with Wilder's smoothing
//!
//! The first average gain/loss is the simple mean of the first `period` close-to-close
//! changes; every later change is folded in as `avg = (avg * (period - 1) + x) / period`.
//! A value therefore exists only from the `period + 1`-th close onwards.
//!
//! `ta::indicators::RelativeStrengthIndex` seeds its averages with a fixed 0.1 and uses
//! EMA smoothing, so a pure up-run never reaches 100. This implementation keeps the `ta`
//! trait surface (`Next`, `Reset`, `Period`) so it slots in the same way.

use crate::domain::market::Candle;
use rust_decimal::prelude::ToPrimitive;
use ta::errors::{Result as TaResult, TaError};
use ta::{Close, Next, Period, Reset};

impl Close for Candle {
    fn close(&self) -> f64 {
        self.close.to_f64().unwrap_or_default()
    }
}

/// Streaming RSI state
#[derive(Debug, Clone)]
pub struct WilderRsi {
    period: usize,
    prev_close: Option<f64>,
    changes: usize,
    gain_sum: f64,
    loss_sum: f64,
    avg_gain: f64,
    avg_loss: f64,
}

impl WilderRsi {
    pub fn new(period: usize) -> TaResult<Self> {
        if period == 0 {
            return Err(TaError::InvalidParameter);
        }
        Ok(Self {
            period,
            prev_close: None,
            changes: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        })
    }

    fn value(&self) -> f64 {
        // No losses over the period, flat runs included
        if self.avg_loss == 0.0 {
            return 100.0;
        }
        let rs = self.avg_gain / self.avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

impl Next<f64> for WilderRsi {
    type Output = Option<f64>;

    fn next(&mut self, close: f64) -> Self::Output {
        let prev = self.prev_close.replace(close)?;

        let change = close - prev;
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };

        self.changes += 1;
        let n = self.period as f64;

        if self.changes < self.period {
            self.gain_sum += gain;
            self.loss_sum += loss;
            return None;
        }

        if self.changes == self.period {
            self.avg_gain = (self.gain_sum + gain) / n;
            self.avg_loss = (self.loss_sum + loss) / n;
        } else {
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        }

        Some(self.value())
    }
}

impl<T: Close> Next<&T> for WilderRsi {
    type Output = Option<f64>;

    fn next(&mut self, input: &T) -> Self::Output {
        self.next(input.close())
    }
}

impl Period for WilderRsi {
    fn period(&self) -> usize {
        self.period
    }
}

impl Reset for WilderRsi {
    fn reset(&mut self) {
        self.prev_close = None;
        self.changes = 0;
        self.gain_sum = 0.0;
        self.loss_sum = 0.0;
        self.avg_gain = 0.0;
        self.avg_loss = 0.0;
    }
}

/// Outcome of evaluating RSI over a candle window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RsiReading {
    Value(f64),
    /// Normal warm-up state, not an error
    InsufficientData { required: usize, available: usize },
}

impl RsiReading {
    pub fn value(&self) -> Option<f64> {
        match self {
            RsiReading::Value(v) => Some(*v),
            RsiReading::InsufficientData { .. } => None,
        }
    }
}

/// RSI of the most recent candle in `window`.
///
/// Candles are evaluated in ascending open time regardless of slice order. A period of 0 is
/// treated as 1.
pub fn rsi(window: &[Candle], period: usize) -> RsiReading {
    let period = period.max(1);
    let required = period + 1;
    if window.len() < required {
        return RsiReading::InsufficientData {
            required,
            available: window.len(),
        };
    }

    let mut ordered: Vec<&Candle> = window.iter().collect();
    ordered.sort_by_key(|c| c.open_time);

    let mut indicator = match WilderRsi::new(period) {
        Ok(indicator) => indicator,
        Err(_) => {
            return RsiReading::InsufficientData {
                required,
                available: window.len(),
            };
        }
    };

    ordered
        .into_iter()
        .fold(None, |_, candle| indicator.next(candle))
        .map(RsiReading::Value)
        .unwrap_or(RsiReading::InsufficientData {
            required,
            available: window.len(),
        })
}
