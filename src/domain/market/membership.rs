use std::fmt;

/// Monitoring label of a known symbol.
///
/// `Invalid` is terminal for the session. `LowVolume` and `Eligible` flip back and forth as
/// volume reevaluation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolStatus {
    /// Actively monitored: has a candle window and is part of the live subscription
    Eligible,
    /// The provider had no history for it during seeding
    Invalid,
    /// Last observed 24h volume was under the configured minimum
    LowVolume,
}

impl SymbolStatus {
    pub fn is_eligible(&self) -> bool {
        matches!(self, SymbolStatus::Eligible)
    }
}

impl fmt::Display for SymbolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolStatus::Eligible => write!(f, "eligible"),
            SymbolStatus::Invalid => write!(f, "invalid"),
            SymbolStatus::LowVolume => write!(f, "low-volume"),
        }
    }
}
