use crate::domain::market::Timeframe;
use std::time::Duration;

/// Orchestrator timing and sizing
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub timeframe: Timeframe,

    /// Candle window capacity N
    pub window_capacity: usize,

    /// Klines requested per symbol when seeding (never more than `window_capacity`)
    pub history_length: usize,

    /// Spacing between consecutive per-symbol history requests
    pub seed_delay: Duration,

    /// Period of the indicator-check loop
    pub check_interval: Duration,

    /// Gap between tearing down a subscription and opening its replacement
    pub resubscribe_delay: Duration,

    /// Grace period before the Starting phase
    pub startup_delay: Duration,

    /// Period of the status log line
    pub status_interval: Duration,
}

impl MonitorConfig {
    pub fn seed_limit(&self) -> usize {
        self.history_length.min(self.window_capacity).max(1)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::OneMin,
            window_capacity: 50,
            history_length: 50,
            seed_delay: Duration::from_millis(100),
            check_interval: Duration::from_secs(1),
            resubscribe_delay: Duration::from_secs(1),
            startup_delay: Duration::from_secs(5),
            status_interval: Duration::from_secs(5 * 60),
        }
    }
}
