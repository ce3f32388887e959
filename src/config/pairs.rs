//! Candidate symbol list (`pairs.json`).
//!
//! ```json
//! { "tradingPairs": [ { "symbol": "BTCUSDT", "priority": "High" }, { "symbol": "ETHUSDT" } ] }
//! ```

use crate::domain::market::TradingPair;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairsFile {
    #[serde(default)]
    trading_pairs: Vec<TradingPair>,
}

/// Parses a pairs document. Symbols are normalized and de-duplicated keeping the first entry.
pub fn parse_pairs(json: &str) -> Result<Vec<TradingPair>> {
    let file: PairsFile = serde_json::from_str(json).context("Invalid pairs file")?;

    let mut seen = HashSet::new();
    let mut pairs = Vec::with_capacity(file.trading_pairs.len());
    for pair in file.trading_pairs {
        let pair = TradingPair::new(&pair.symbol, pair.priority);
        if pair.symbol.is_empty() {
            warn!("Pairs file: Skipping entry with empty symbol");
            continue;
        }
        if !seen.insert(pair.symbol.clone()) {
            warn!("Pairs file: Duplicate symbol {} ignored", pair.symbol);
            continue;
        }
        pairs.push(pair);
    }
    Ok(pairs)
}

pub fn load_pairs(path: impl AsRef<Path>) -> Result<Vec<TradingPair>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pairs file {}", path.display()))?;
    let pairs =
        parse_pairs(&json).with_context(|| format!("Failed to load {}", path.display()))?;

    info!("Loaded {} trading pairs from {}", pairs.len(), path.display());
    Ok(pairs)
}
