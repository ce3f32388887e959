// Market data domain
pub mod market;

// Alert payloads
pub mod alerts;

// Validated configuration values
pub mod config;

// Port interfaces
pub mod ports;

// Domain-specific error types
pub mod errors;
