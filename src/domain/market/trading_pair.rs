use super::candle::normalize_symbol;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Operator-assigned importance of a pair. Carried through configuration, not used for gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub enum Priority {
    #[default]
    None,
    Low,
    Average,
    High,
}

impl Priority {
    fn from_level(level: u64) -> Option<Self> {
        match level {
            0 => Some(Priority::None),
            1 => Some(Priority::Low),
            2 => Some(Priority::Average),
            3 => Some(Priority::High),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "none" => Some(Priority::None),
            "low" => Some(Priority::Low),
            "average" => Some(Priority::Average),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

// Pairs files written by older tooling store the priority as its numeric level
impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Level(u64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Level(level) => Priority::from_level(level)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown priority level {}", level))),
            Raw::Name(name) => Priority::from_name(&name)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown priority '{}'", name))),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A candidate symbol from the pairs file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPair {
    pub symbol: String,
    #[serde(default)]
    pub priority: Priority,
}

impl TradingPair {
    pub fn new(symbol: &str, priority: Priority) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_accepts_names_and_levels() {
        let by_name: Priority = serde_json::from_str("\"High\"").unwrap();
        let by_level: Priority = serde_json::from_str("2").unwrap();
        assert_eq!(by_name, Priority::High);
        assert_eq!(by_level, Priority::Average);
        assert!(serde_json::from_str::<Priority>("7").is_err());
        assert!(serde_json::from_str::<Priority>("\"urgent\"").is_err());
    }

    #[test]
    fn test_trading_pair_default_priority() {
        let pair: TradingPair = serde_json::from_str(r#"{"symbol":"BTCUSDT"}"#).unwrap();
        assert_eq!(pair.priority, Priority::None);
    }
}
