pub mod candle;
pub mod orderbook;

// Re-export the Candle struct for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::{closes, parse_candles, Candle};
pub use orderbook::{parse_orderbook, OrderBook};
