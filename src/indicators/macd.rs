// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   MACD line   = EMA(close, short) - EMA(close, long)
//   Signal line = EMA(MACD line, signal)
//   Histogram   = MACD line - Signal line
//
// All three EMAs use the first-observation seeding from `ema.rs`, so every
// output index is defined.
// =============================================================================

use serde::Serialize;

use super::ema::ema_unchecked;
use super::{ensure_finite_output, validate_period, validate_series, IndicatorResult};

pub const DEFAULT_SHORT_PERIOD: usize = 12;
pub const DEFAULT_LONG_PERIOD: usize = 26;
pub const DEFAULT_SIGNAL_PERIOD: usize = 9;

/// The three aligned MACD series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// Compute MACD for `series`.
///
/// # Errors
/// `InvalidInput` when any period is zero, the series is empty, any value
/// is non-finite, or the EMA difference overflows.
pub fn macd(
    series: &[f64],
    short_period: usize,
    long_period: usize,
    signal_period: usize,
) -> IndicatorResult<Macd> {
    validate_period("MACD short period", short_period)?;
    validate_period("MACD long period", long_period)?;
    validate_period("MACD signal period", signal_period)?;
    validate_series(series)?;

    let ema_short = ema_unchecked(series, short_period);
    let ema_long = ema_unchecked(series, long_period);

    let line: Vec<f64> = ema_short
        .iter()
        .zip(ema_long.iter())
        .map(|(s, l)| s - l)
        .collect();
    let signal = ema_unchecked(&line, signal_period);
    let histogram: Vec<f64> = line.iter().zip(signal.iter()).map(|(m, s)| m - s).collect();
    ensure_finite_output("MACD", line.iter().chain(&signal).chain(&histogram))?;

    Ok(Macd {
        line,
        signal,
        histogram,
    })
}

/// MACD with the conventional 12 / 26 / 9 periods.
pub fn macd_default(series: &[f64]) -> IndicatorResult<Macd> {
    macd(
        series,
        DEFAULT_SHORT_PERIOD,
        DEFAULT_LONG_PERIOD,
        DEFAULT_SIGNAL_PERIOD,
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{ema, IndicatorError};

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i as f64 * 0.35).sin() * 8.0 + i as f64 * 0.1)
            .collect()
    }

    #[test]
    fn histogram_is_exact_difference() {
        let result = macd_default(&wave(120)).unwrap();
        assert_eq!(result.line.len(), 120);
        for i in 0..result.line.len() {
            assert_eq!(result.histogram[i], result.line[i] - result.signal[i]);
        }
    }

    #[test]
    fn line_matches_ema_difference() {
        let series = wave(60);
        let result = macd(&series, 5, 13, 4).unwrap();
        let fast = ema(&series, 5).unwrap();
        let slow = ema(&series, 13).unwrap();
        for i in 0..series.len() {
            assert_eq!(result.line[i], fast[i] - slow[i]);
        }
        assert_eq!(result.signal, ema(&result.line, 4).unwrap());
    }

    #[test]
    fn first_row_is_zero() {
        // Both EMAs seed at series[0], so the line and signal start at zero.
        let result = macd_default(&wave(10)).unwrap();
        assert_eq!(result.line[0], 0.0);
        assert_eq!(result.signal[0], 0.0);
        assert_eq!(result.histogram[0], 0.0);
    }

    #[test]
    fn rising_series_has_positive_line() {
        let series: Vec<f64> = (1..=80).map(|x| x as f64).collect();
        let result = macd_default(&series).unwrap();
        assert!(result.line[1..].iter().all(|&v| v > 0.0));
    }

    #[test]
    fn zero_period_rejected() {
        let series = wave(30);
        for (s, l, g) in [(0, 26, 9), (12, 0, 9), (12, 26, 0)] {
            assert!(matches!(
                macd(&series, s, l, g),
                Err(IndicatorError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn empty_series_rejected() {
        assert!(macd_default(&[]).is_err());
    }

    #[test]
    fn overflowing_line_is_rejected() {
        // EMA(1) follows the swing while EMA(100) barely moves; their
        // difference exceeds f64::MAX.
        let series = [1.5e308, -1.5e308, 1.5e308, -1.5e308];
        assert!(matches!(
            macd(&series, 1, 100, 2),
            Err(IndicatorError::InvalidInput(_))
        ));
    }
}
