// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the technical indicators offered
// by the shell, the scanner and the advisor snapshot.  Every public function
// borrows its input, validates it once, and returns either a complete series
// aligned one-to-one with the input or `IndicatorError::InvalidInput`.
//
// Entries that do not have enough history yet are `None`, never `0.0` and
// never `NaN`.

pub mod atr;
pub mod crossover;
pub mod ema;
pub mod levels;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use atr::{atr, true_range};
pub use crossover::{crossover_signals, CrossSignal};
pub use ema::ema;
pub use levels::{stop_loss_and_target, RiskLevels};
pub use macd::{macd, Macd};
pub use rsi::{rsi, RsiZone};
pub use sma::sma;

use thiserror::Error;

use crate::market_data::Candle;

/// The only error the indicator engine raises.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("invalid indicator input: {0}")]
    InvalidInput(String),
}

pub type IndicatorResult<T> = std::result::Result<T, IndicatorError>;

/// Reject empty series and series containing `NaN` or infinities.
pub fn validate_series(series: &[f64]) -> IndicatorResult<()> {
    if series.is_empty() {
        return Err(IndicatorError::InvalidInput("price series is empty".into()));
    }
    if let Some(idx) = series.iter().position(|v| !v.is_finite()) {
        return Err(IndicatorError::InvalidInput(format!(
            "non-numeric value {} at index {idx}",
            series[idx]
        )));
    }
    Ok(())
}

/// Reject a computed series that overflowed.  Finite inputs near `f64::MAX`
/// can still produce infinite differences or window sums.
pub(crate) fn ensure_finite_output<'a>(
    name: &str,
    values: impl IntoIterator<Item = &'a f64>,
) -> IndicatorResult<()> {
    if let Some(idx) = values.into_iter().position(|v| !v.is_finite()) {
        return Err(IndicatorError::InvalidInput(format!(
            "{name} overflowed at index {idx}; input magnitude too large"
        )));
    }
    Ok(())
}

/// Reject a zero look-back window.
pub fn validate_period(name: &str, period: usize) -> IndicatorResult<()> {
    if period == 0 {
        return Err(IndicatorError::InvalidInput(format!(
            "{name} must be at least 1"
        )));
    }
    Ok(())
}

/// Reject empty candle slices, non-finite fields and out-of-order timestamps.
pub fn validate_candles(candles: &[Candle]) -> IndicatorResult<()> {
    if candles.is_empty() {
        return Err(IndicatorError::InvalidInput("candle series is empty".into()));
    }

    for (idx, c) in candles.iter().enumerate() {
        let fields = [c.open, c.high, c.low, c.close, c.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(IndicatorError::InvalidInput(format!(
                "non-numeric OHLCV value in row {idx}"
            )));
        }
        if idx > 0 && c.timestamp <= candles[idx - 1].timestamp {
            return Err(IndicatorError::InvalidInput(format!(
                "candle timestamps must be strictly ascending (row {idx})"
            )));
        }
    }
    Ok(())
}
