// =============================================================================
// Relative Strength Index (RSI) — EMA smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.  Index 0
//          has no delta and contributes a zero gain and a zero loss.
// Step 2 — gain = max(delta, 0), loss = max(-delta, 0).
// Step 3 — avg_gain / avg_loss = EMA(gain) / EMA(loss), multiplier
//          2 / (period + 1), seeded at the first element.
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Thresholds:  RSI >= 70 => OVERBOUGHT,  RSI <= 30 => OVERSOLD.
// =============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ema::ema_unchecked;
use super::{validate_period, validate_series, IndicatorResult};

pub const DEFAULT_RSI_PERIOD: usize = 14;

pub const OVERBOUGHT: f64 = 70.0;
pub const OVERSOLD: f64 = 30.0;

/// Compute the full RSI series for `series` and `period`.
///
/// The output is aligned with the input.  Index 0 is `None` (no price change
/// observed yet); every later index is defined and lies in `[0, 100]`.
///
/// # Edge cases
/// - Average loss zero, average gain positive => 100.0.
/// - Average loss and average gain both zero (flat market) => 50.0.
/// - Deltas that overflow `f64` still yield a value in `[0, 100]`.
///
/// # Errors
/// `InvalidInput` when `period == 0`, the series is empty, or any value is
/// non-finite.
pub fn rsi(series: &[f64], period: usize) -> IndicatorResult<Vec<Option<f64>>> {
    validate_period("RSI period", period)?;
    validate_series(series)?;

    let mut gains = Vec::with_capacity(series.len());
    let mut losses = Vec::with_capacity(series.len());
    gains.push(0.0);
    losses.push(0.0);
    for w in series.windows(2) {
        let delta = w[1] - w[0];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    let avg_gain = ema_unchecked(&gains, period);
    let avg_loss = ema_unchecked(&losses, period);

    let mut out = Vec::with_capacity(series.len());
    out.push(None);
    for i in 1..series.len() {
        out.push(Some(rsi_from_averages(avg_gain[i], avg_loss[i])));
    }

    Ok(out)
}

/// Return the most recent RSI value, or `None` when the series has a single
/// element.
pub fn latest_rsi(series: &[f64], period: usize) -> IndicatorResult<Option<f64>> {
    Ok(rsi(series, period)?.last().copied().flatten())
}

/// Overbought / oversold classification of an RSI reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiZone {
    Overbought,
    Neutral,
    Oversold,
}

impl RsiZone {
    pub fn classify(value: f64) -> Self {
        if value >= OVERBOUGHT {
            Self::Overbought
        } else if value <= OVERSOLD {
            Self::Oversold
        } else {
            Self::Neutral
        }
    }
}

impl fmt::Display for RsiZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overbought => write!(f, "OVERBOUGHT"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Oversold => write!(f, "OVERSOLD"),
        }
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// Averages overflow to infinity when consecutive closes are near `f64::MAX`
/// apart; an infinite side dominates, two infinite sides are neutral.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    match (avg_gain.is_finite(), avg_loss.is_finite()) {
        (false, false) => return 50.0,
        (false, true) => return 100.0,
        (true, false) => return 0.0,
        (true, true) => {}
    }

    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // No movement at all — neutral.
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
    }
}
