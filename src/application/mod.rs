// Alert evaluation and delivery
pub mod alerts;

// Indicator math over candle windows
pub mod indicators;

// Shared market state
pub mod market_data;

// Volume gate, subscription controller and orchestrator
pub mod monitoring;
