pub mod auth;
pub mod client;
pub mod interval;
pub mod rate_limit;

pub use client::{MarketInfo, UpbitClient};
pub use interval::CandleInterval;
