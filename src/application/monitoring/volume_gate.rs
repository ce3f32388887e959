use crate::application::market_data::VolumeCache;
use crate::domain::config::VolumeFilterConfig;
use crate::domain::errors::is_fatal_provider_error;
use crate::domain::market::normalize_symbol;
use crate::domain::ports::MarketDataService;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of one volume check over a candidate list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeScreening {
    /// At or above the minimum, in candidate order
    pub eligible: Vec<String>,
    /// Below the minimum, sorted by ascending volume
    pub low_volume: Vec<(String, Decimal)>,
    /// Volume request failed this cycle
    pub failed: Vec<String>,
    /// Set when the provider rejected our credentials; screening stops there
    pub fatal: Option<String>,
    /// Cancellation interrupted the pass
    pub interrupted: bool,
}

/// Classifies symbols by 24h quote volume and keeps the last observed values.
pub struct VolumeGate {
    market: Arc<dyn MarketDataService>,
    config: VolumeFilterConfig,
    cache: Arc<VolumeCache>,
}

impl VolumeGate {
    pub fn new(
        market: Arc<dyn MarketDataService>,
        config: VolumeFilterConfig,
        cache: Arc<VolumeCache>,
    ) -> Self {
        Self {
            market,
            config,
            cache,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &VolumeFilterConfig {
        &self.config
    }

    pub fn cache(&self) -> Arc<VolumeCache> {
        self.cache.clone()
    }

    /// Eligible subset of `candidates`
    pub async fn filter_eligible(&self, candidates: &[String]) -> Vec<String> {
        self.screen(candidates, &CancellationToken::new())
            .await
            .eligible
    }

    pub fn cached_volume(&self, symbol: &str) -> Option<Decimal> {
        self.cache.get(&normalize_symbol(symbol))
    }

    pub fn cached_volumes(&self) -> HashMap<String, Decimal> {
        self.cache.snapshot()
    }

    /// Checks candidates one at a time, `request_delay` apart.
    ///
    /// With the filter disabled every candidate passes and nothing is fetched. A symbol whose
    /// request fails is left out of `eligible` for this pass only.
    pub async fn screen(
        &self,
        candidates: &[String],
        cancel: &CancellationToken,
    ) -> VolumeScreening {
        let mut screening = VolumeScreening::default();

        if !self.config.enabled {
            screening.eligible = candidates.iter().map(|s| normalize_symbol(s)).collect();
            return screening;
        }

        for (i, symbol) in candidates.iter().enumerate() {
            if i > 0 && !self.config.request_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.request_delay) => {}
                }
            }
            if cancel.is_cancelled() {
                screening.interrupted = true;
                break;
            }

            let symbol = normalize_symbol(symbol);
            match self.market.get_24h_volume(&symbol).await {
                Ok(volume) => {
                    self.cache.update(symbol.clone(), volume);
                    if volume >= self.config.minimum_volume {
                        screening.eligible.push(symbol);
                    } else {
                        screening.low_volume.push((symbol, volume));
                    }
                }
                Err(e) if is_fatal_provider_error(&e) => {
                    screening.fatal = Some(format!("{:#}", e));
                    break;
                }
                Err(e) => {
                    warn!("VolumeGate: Failed to fetch 24h volume for {}: {:#}", symbol, e);
                    screening.failed.push(symbol);
                }
            }
        }

        screening.low_volume.sort_by(|a, b| a.1.cmp(&b.1));

        info!(
            "VolumeGate: {} eligible, {} below {} USDT, {} failed",
            screening.eligible.len(),
            screening.low_volume.len(),
            self.config.minimum_volume,
            screening.failed.len()
        );
        if !screening.low_volume.is_empty() {
            let listing: Vec<String> = screening
                .low_volume
                .iter()
                .map(|(symbol, volume)| format!("{} ({})", symbol, volume.round_dp(0)))
                .collect();
            info!("VolumeGate: Low volume: {}", listing.join(", "));
        }

        screening
    }
}
