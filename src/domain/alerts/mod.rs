use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which RSI band was breached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertDirection {
    Overbought,
    Oversold,
}

impl AlertDirection {
    /// Classifies an RSI reading against the configured band; `None` when inside it
    pub fn classify(rsi: f64, upper: f64, lower: f64) -> Option<Self> {
        if rsi > upper {
            Some(AlertDirection::Overbought)
        } else if rsi < lower {
            Some(AlertDirection::Oversold)
        } else {
            None
        }
    }
}

impl fmt::Display for AlertDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertDirection::Overbought => write!(f, "Overbought"),
            AlertDirection::Oversold => write!(f, "Oversold"),
        }
    }
}

/// Everything needed to render one threshold alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiAlert {
    pub symbol: String,
    pub direction: AlertDirection,
    pub rsi: f64,
    pub last_close: Decimal,
    /// Last cached 24h quote volume, display only
    pub volume_24h: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}
