//! Indicator, alerting, volume filter and scheduling parameters.

use super::{EnvVars, parse_bool, parse_or};
use crate::domain::config::{MonitorConfig, RsiAlertConfig, VolumeFilterConfig};
use crate::domain::market::Timeframe;
use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct MonitorEnvConfig {
    pub alerts: RsiAlertConfig,
    pub volume: VolumeFilterConfig,
    pub monitor: MonitorConfig,
}

impl MonitorEnvConfig {
    pub(crate) fn from_vars(vars: &EnvVars) -> Result<Self> {
        let defaults = RsiAlertConfig::default();
        let cooldown_minutes: u64 = parse_or(vars, "ALERT_COOLDOWN_MINUTES", 5)?;
        let alerts = RsiAlertConfig::new(
            parse_or(vars, "RSI_PERIOD", defaults.period)?,
            parse_or(vars, "RSI_UPPER_THRESHOLD", defaults.upper_threshold)?,
            parse_or(vars, "RSI_LOWER_THRESHOLD", defaults.lower_threshold)?,
            scaled_secs(cooldown_minutes, 60, "ALERT_COOLDOWN_MINUTES")?,
        )
        .context("Invalid RSI alert configuration")?;

        let minimum_volume: Decimal =
            parse_or(vars, "MIN_VOLUME_USDT", Decimal::from(20_000_000u64))?;
        if minimum_volume.is_sign_negative() {
            bail!("MIN_VOLUME_USDT must not be negative, got {}", minimum_volume);
        }
        let check_hours = positive(
            parse_or(vars, "VOLUME_CHECK_INTERVAL_HOURS", 1u64)?,
            "VOLUME_CHECK_INTERVAL_HOURS",
        )?;
        let volume = VolumeFilterConfig {
            enabled: parse_bool(vars, "VOLUME_FILTER_ENABLED", true)?,
            minimum_volume,
            check_interval: scaled_secs(check_hours, 60 * 60, "VOLUME_CHECK_INTERVAL_HOURS")?,
            request_delay: Duration::from_millis(parse_or(
                vars,
                "VOLUME_REQUEST_DELAY_MS",
                50u64,
            )?),
        };

        let mut window_capacity: usize = parse_or(vars, "CANDLE_WINDOW_CAPACITY", 50)?;
        if window_capacity < alerts.min_history() {
            warn!(
                "CANDLE_WINDOW_CAPACITY={} is too small for RSI_PERIOD={}, using {}",
                window_capacity,
                alerts.period,
                alerts.min_history()
            );
            window_capacity = alerts.min_history();
        }

        let check_ms = positive(
            parse_or(vars, "INDICATOR_CHECK_INTERVAL_MS", 1000u64)?,
            "INDICATOR_CHECK_INTERVAL_MS",
        )?;
        let status_secs = positive(
            parse_or(vars, "STATUS_LOG_INTERVAL_SECS", 300u64)?,
            "STATUS_LOG_INTERVAL_SECS",
        )?;
        let history_length = positive(
            parse_or(vars, "HISTORY_SEED_LENGTH", 50usize)?,
            "HISTORY_SEED_LENGTH",
        )?;
        let monitor = MonitorConfig {
            timeframe: parse_or(vars, "KLINE_INTERVAL", Timeframe::OneMin)?,
            window_capacity,
            history_length,
            seed_delay: Duration::from_millis(parse_or(vars, "SEED_REQUEST_DELAY_MS", 100u64)?),
            check_interval: Duration::from_millis(check_ms),
            resubscribe_delay: Duration::from_millis(parse_or(
                vars,
                "RESUBSCRIBE_DELAY_MS",
                1000u64,
            )?),
            startup_delay: Duration::from_secs(parse_or(vars, "STARTUP_DELAY_SECS", 5u64)?),
            status_interval: Duration::from_secs(status_secs),
        };

        Ok(Self {
            alerts,
            volume,
            monitor,
        })
    }
}

/// `value` units of `unit_secs` seconds each, rejecting overflow
fn scaled_secs(value: u64, unit_secs: u64, key: &str) -> Result<Duration> {
    value
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .with_context(|| format!("{} is too large: {}", key, value))
}

fn positive<T: PartialEq + Default + Copy>(value: T, key: &str) -> Result<T> {
    if value == T::default() {
        bail!("{} must be greater than zero", key);
    }
    Ok(value)
}
