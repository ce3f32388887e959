// Shared market state: candle windows and 24h volumes
pub mod candle_store;
pub mod volume_cache;

pub use candle_store::CandleStore;
pub use volume_cache::VolumeCache;
