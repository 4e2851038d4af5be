// =============================================================================
// Order Book snapshot
// =============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A single price level pair as returned by Upbit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookUnit {
    pub ask_price: f64,
    pub bid_price: f64,
    pub ask_size: f64,
    pub bid_size: f64,
}

/// Order book snapshot for a single market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub market: String,
    pub timestamp: i64,
    pub total_ask_size: f64,
    pub total_bid_size: f64,
    #[serde(rename = "orderbook_units")]
    pub units: Vec<OrderBookUnit>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<f64> {
        self.units.first().map(|u| u.bid_price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.units.first().map(|u| u.ask_price)
    }

    /// Spread between best ask and best bid in basis points of the mid price.
    pub fn spread_bps(&self) -> Option<f64> {
        let (bid, ask) = (self.best_bid()?, self.best_ask()?);
        let mid = (bid + ask) / 2.0;
        if mid > 0.0 {
            Some((ask - bid) / mid * 10_000.0)
        } else {
            None
        }
    }

    /// Depth imbalance in [-1, +1]; positive when bids outweigh asks.
    pub fn imbalance(&self) -> f64 {
        let total = self.total_bid_size + self.total_ask_size;
        if total > 0.0 {
            (self.total_bid_size - self.total_ask_size) / total
        } else {
            0.0
        }
    }
}

/// Parse the `/v1/orderbook` response and return the entry for `market`.
pub fn parse_orderbook(market: &str, body: &serde_json::Value) -> Result<OrderBook> {
    let books: Vec<OrderBook> = serde_json::from_value(body.clone())
        .context("orderbook response is not an array of orderbook objects")?;

    books
        .into_iter()
        .find(|b| b.market == market)
        .with_context(|| format!("orderbook for {market} missing from response"))
}
