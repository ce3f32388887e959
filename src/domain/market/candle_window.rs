use super::candle::Candle;
use std::collections::VecDeque;

/// Result of applying one candle to a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New open time: pushed at the back (oldest entry evicted on overflow)
    Appended,
    /// Same open time as the last entry: overwritten in place
    Replaced,
    /// Older than the last entry: ignored
    Rejected,
}

/// Bounded, open-time ordered candle history for one symbol.
///
/// Invariants:
/// - `len() <= capacity()`, eviction is oldest-first
/// - open times strictly increase front to back (one candle per open time)
/// - only the last candle may be unclosed
#[derive(Debug, Clone)]
pub struct CandleWindow {
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl CandleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            candles: VecDeque::with_capacity(capacity),
        }
    }

    /// Builds a window from a historical snapshot in any order.
    ///
    /// Duplicated open times keep the later entry of the input; only the newest
    /// `capacity` candles survive.
    pub fn from_history(capacity: usize, mut history: Vec<Candle>) -> Self {
        history.sort_by_key(|c| c.open_time);

        let mut window = Self::new(capacity);
        for candle in history {
            window.upsert(candle);
        }
        window
    }

    pub fn upsert(&mut self, candle: Candle) -> UpsertOutcome {
        let Some(last) = self.candles.back_mut() else {
            self.candles.push_back(candle);
            return UpsertOutcome::Appended;
        };

        if candle.open_time == last.open_time {
            *last = candle;
            return UpsertOutcome::Replaced;
        }

        if candle.open_time < last.open_time {
            return UpsertOutcome::Rejected;
        }

        // A newer interval started, so the previous one has elapsed
        last.is_closed = true;
        self.candles.push_back(candle);
        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }
        UpsertOutcome::Appended
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }

    /// Owned copy in open-time order
    pub fn to_vec(&self) -> Vec<Candle> {
        self.candles.iter().cloned().collect()
    }
}
