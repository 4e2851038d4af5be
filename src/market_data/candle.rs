// =============================================================================
// Candles — OHLCV rows and Upbit candle parsing
// =============================================================================
//
// Upbit returns candles newest first with UTC start-time strings; they are
// turned into oldest-first rows keyed by UTC millis.
// =============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV candle.  `timestamp` is the candle start in Unix millis (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Candle start as a UTC datetime, `None` when the timestamp is out of range.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Close prices of `candles`, in the same order.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

// ---------------------------------------------------------------------------
// Upbit candle payload
// ---------------------------------------------------------------------------

/// One element of the `/v1/candles/*` response array.
///
/// `timestamp` in this payload is the time of the last trade inside the candle,
/// so the candle start is taken from `candle_date_time_utc` instead.
#[derive(Debug, Deserialize)]
struct UpbitCandle {
    candle_date_time_utc: String,
    opening_price: f64,
    high_price: f64,
    low_price: f64,
    trade_price: f64,
    candle_acc_trade_volume: f64,
}

/// Parse an Upbit candle response body into candles ordered oldest-first.
///
/// Upbit returns the newest candle first; entries whose start time cannot be
/// parsed are skipped with a warning.
pub fn parse_candles(body: &serde_json::Value) -> Result<Vec<Candle>> {
    let raw: Vec<UpbitCandle> = serde_json::from_value(body.clone())
        .context("candle response is not an array of candle objects")?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let start = match NaiveDateTime::parse_from_str(&entry.candle_date_time_utc, "%Y-%m-%dT%H:%M:%S") {
            Ok(dt) => dt.and_utc().timestamp_millis(),
            Err(e) => {
                warn!(
                    value = %entry.candle_date_time_utc,
                    error = %e,
                    "skipping candle with unparseable start time"
                );
                continue;
            }
        };

        candles.push(Candle::new(
            start,
            entry.opening_price,
            entry.high_price,
            entry.low_price,
            entry.trade_price,
            entry.candle_acc_trade_volume,
        ));
    }

    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
    Ok(candles)
}
