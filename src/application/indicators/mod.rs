pub mod rsi;

pub use rsi::{RsiReading, WilderRsi, rsi};
