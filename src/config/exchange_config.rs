//! Binance USD-M futures endpoints and credentials.

use super::{EnvVars, parse_url};
use anyhow::Result;

/// Binance futures API configuration
#[derive(Debug, Clone)]
pub struct BinanceFuturesConfig {
    /// Optional, public market data works without it
    pub api_key: String,
    pub base_url: String,
    pub ws_url: String,
}

impl Default for BinanceFuturesConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://fapi.binance.com".to_string(),
            ws_url: "wss://fstream.binance.com".to_string(),
        }
    }
}

impl BinanceFuturesConfig {
    pub(crate) fn from_vars(vars: &EnvVars) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            api_key: vars("BINANCE_API_KEY").unwrap_or_default(),
            base_url: parse_url(vars, "BINANCE_FUTURES_BASE_URL", &defaults.base_url)?,
            ws_url: parse_url(vars, "BINANCE_FUTURES_WS_URL", &defaults.ws_url)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::vars_from;

    #[test]
    fn test_binance_defaults() {
        let config = BinanceFuturesConfig::from_vars(&vars_from(&[])).unwrap();
        assert_eq!(config.base_url, "https://fapi.binance.com");
        assert_eq!(config.ws_url, "wss://fstream.binance.com");
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_binance_rejects_invalid_url() {
        let vars = vars_from(&[("BINANCE_FUTURES_BASE_URL", "not a url")]);
        let err = BinanceFuturesConfig::from_vars(&vars).unwrap_err();
        assert!(format!("{:#}", err).contains("BINANCE_FUTURES_BASE_URL"));
    }

    #[test]
    fn test_binance_trailing_slash_trimmed() {
        let vars = vars_from(&[("BINANCE_FUTURES_BASE_URL", "https://testnet.binancefuture.com/")]);
        let config = BinanceFuturesConfig::from_vars(&vars).unwrap();
        assert_eq!(config.base_url, "https://testnet.binancefuture.com");
    }
}
