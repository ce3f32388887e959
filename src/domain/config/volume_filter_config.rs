use rust_decimal::Decimal;
use std::time::Duration;

/// 24h volume gating parameters
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeFilterConfig {
    /// When false every candidate passes and no volumes are fetched
    pub enabled: bool,

    /// Inclusive minimum 24h quote volume (USDT)
    pub minimum_volume: Decimal,

    /// Period of the reevaluation loop
    pub check_interval: Duration,

    /// Spacing between consecutive per-symbol volume requests
    pub request_delay: Duration,
}

impl Default for VolumeFilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            minimum_volume: Decimal::from(20_000_000u64),
            check_interval: Duration::from_secs(60 * 60),
            request_delay: Duration::from_millis(50),
        }
    }
}
