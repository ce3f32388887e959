use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

/// Last observed 24h quote volume per symbol.
///
/// Written by the volume gate on every check, read by the alert dispatcher for display.
pub struct VolumeCache {
    volumes: RwLock<HashMap<String, Decimal>>,
}

impl std::fmt::Debug for VolumeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeCache")
            .field("volumes", &"<RwLock>")
            .finish()
    }
}

impl VolumeCache {
    pub fn new() -> Self {
        Self {
            volumes: RwLock::new(HashMap::new()),
        }
    }

    pub fn update(&self, symbol: String, volume: Decimal) {
        match self.volumes.write() {
            Ok(mut guard) => {
                guard.insert(symbol, volume);
            }
            Err(poisoned) => {
                tracing::error!("VolumeCache: Lock poisoned during write, recovering");
                poisoned.into_inner().insert(symbol, volume);
            }
        }
    }

    pub fn get(&self, symbol: &str) -> Option<Decimal> {
        match self.volumes.read() {
            Ok(guard) => guard.get(symbol).copied(),
            Err(poisoned) => poisoned.into_inner().get(symbol).copied(),
        }
    }

    pub fn snapshot(&self) -> HashMap<String, Decimal> {
        match self.volumes.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        match self.volumes.write() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
        tracing::debug!("VolumeCache: cleared");
    }

    pub fn is_empty(&self) -> bool {
        match self.volumes.read() {
            Ok(guard) => guard.is_empty(),
            Err(poisoned) => poisoned.into_inner().is_empty(),
        }
    }
}

impl Default for VolumeCache {
    fn default() -> Self {
        Self::new()
    }
}
