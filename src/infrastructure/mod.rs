pub mod binance;
pub mod core;
pub mod mock;
pub mod telegram;

pub use binance::BinanceMarketDataService;
pub use telegram::TelegramNotifier;
