//! Configuration module for rsiwatch.
//!
//! Everything is read from environment variables (a `.env` file is loaded by the binary),
//! grouped by concern: exchange, notifier, and monitoring. Candidate symbols come from the
//! pairs file named by `PAIRS_FILE`.

mod exchange_config;
mod monitor_env_config;
mod pairs;
mod telegram_config;

pub use exchange_config::BinanceFuturesConfig;
pub use monitor_env_config::MonitorEnvConfig;
pub use pairs::{load_pairs, parse_pairs};
pub use telegram_config::TelegramConfig;

use crate::domain::config::{MonitorConfig, RsiAlertConfig, VolumeFilterConfig};
use anyhow::{Context, Result, anyhow, bail};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Variable lookup used by every sub-config
pub(crate) type EnvVars = dyn Fn(&str) -> Option<String>;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub pairs_file: PathBuf,
    pub binance: BinanceFuturesConfig,
    pub telegram: TelegramConfig,
    pub alerts: RsiAlertConfig,
    pub volume: VolumeFilterConfig,
    pub monitor: MonitorConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&|key: &str| env::var(key).ok())
    }

    pub(crate) fn from_vars(vars: &EnvVars) -> Result<Self> {
        let binance =
            BinanceFuturesConfig::from_vars(vars).context("Failed to load Binance config")?;
        let telegram = TelegramConfig::from_vars(vars).context("Failed to load Telegram config")?;
        let monitoring =
            MonitorEnvConfig::from_vars(vars).context("Failed to load monitoring config")?;

        Ok(Self {
            pairs_file: vars("PAIRS_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("pairs.json")),
            binance,
            telegram,
            alerts: monitoring.alerts,
            volume: monitoring.volume,
            monitor: monitoring.monitor,
        })
    }
}

pub(crate) fn parse_or<T>(vars: &EnvVars, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match vars(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("Failed to parse {}", key)),
        _ => Ok(default),
    }
}

pub(crate) fn parse_bool(vars: &EnvVars, key: &str, default: bool) -> Result<bool> {
    match vars(key).map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => bail!("Failed to parse {}: '{}' is not a boolean", key, v),
        },
    }
}

/// Reads an absolute URL, stripping any trailing slash
pub(crate) fn parse_url(vars: &EnvVars, key: &str, default: &str) -> Result<String> {
    let raw = vars(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    let raw = raw.trim().trim_end_matches('/').to_string();

    url::Url::parse(&raw).with_context(|| format!("Failed to parse {} as a URL", key))?;
    Ok(raw)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) fn vars_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_vars(&vars_from(&[("TELEGRAM_BOT_TOKEN", "123:abc")]))
            .expect("Should parse with defaults");

        assert_eq!(config.pairs_file, PathBuf::from("pairs.json"));
        assert_eq!(config.alerts.period, 14);
        assert_eq!(config.monitor.window_capacity, 50);
        assert!(config.volume.enabled);
    }

    #[test]
    fn test_missing_token_fails() {
        let err = Config::from_vars(&vars_from(&[])).unwrap_err();
        assert!(format!("{:#}", err).contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn test_lookup_outlives_its_source_slice() {
        let key = String::from("RSI_PERIOD");
        let vars = vars_from(&[(key.as_str(), "21")]);
        assert_eq!(parse_or(&vars, "RSI_PERIOD", 14usize).unwrap(), 21);
    }

    #[test]
    fn test_bool_parsing() {
        let vars = vars_from(&[("A", "TRUE"), ("B", "off"), ("C", "maybe"), ("D", "")]);
        assert!(parse_bool(&vars, "A", false).unwrap());
        assert!(!parse_bool(&vars, "B", true).unwrap());
        assert!(parse_bool(&vars, "C", true).is_err());
        assert!(parse_bool(&vars, "D", true).unwrap());
        assert!(!parse_bool(&vars, "MISSING", false).unwrap());
    }
}
