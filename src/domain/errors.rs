use thiserror::Error;

/// Errors related to market data and connectivity
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("Symbol not found on exchange: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("Provider rejected credentials: {reason}")]
    Unauthorized { reason: String },

    #[error("Rate limit exceeded (HTTP {status})")]
    RateLimited { status: u16 },

    #[error("Provider API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed market data for {symbol}: {reason}")]
    Malformed { symbol: String, reason: String },
}

impl MarketDataError {
    /// Authentication failures cannot be fixed by retrying
    pub fn is_fatal(&self) -> bool {
        matches!(self, MarketDataError::Unauthorized { .. })
    }

    /// The exchange does not know the symbol at all
    pub fn is_unknown_symbol(&self) -> bool {
        matches!(self, MarketDataError::SymbolNotFound { .. })
    }
}

/// Returns true when an `anyhow` chain carries a fatal provider error
pub fn is_fatal_provider_error(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<MarketDataError>())
        .any(MarketDataError::is_fatal)
}

/// Returns true when an `anyhow` chain says the symbol does not exist on the exchange
pub fn is_unknown_symbol_error(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<MarketDataError>())
        .any(MarketDataError::is_unknown_symbol)
}

/// Errors related to alert notification delivery
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Notifier is not configured: {reason}")]
    NotConfigured { reason: String },

    #[error("Notifier rejected the message: {reason}")]
    Rejected { reason: String },
}

/// Terminal outcomes of the monitor orchestrator
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("No eligible symbols after seeding ({invalid} invalid, {low_volume} below volume threshold)")]
    NoEligibleSymbols { invalid: usize, low_volume: usize },

    #[error("Market data provider authentication failed: {reason}")]
    ProviderAuthentication { reason: String },

    #[error("Monitor cancelled during {phase}")]
    Cancelled { phase: String },
}
