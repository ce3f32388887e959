// Market data domain: candles, bounded windows, intervals, symbol membership
pub mod candle;
pub mod candle_window;
pub mod membership;
pub mod timeframe;
pub mod trading_pair;

pub use candle::{Candle, CandleUpdate, normalize_symbol};
pub use candle_window::{CandleWindow, UpsertOutcome};
pub use membership::SymbolStatus;
pub use timeframe::Timeframe;
pub use trading_pair::{Priority, TradingPair};
