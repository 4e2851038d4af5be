// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_0      = close_0
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The series is seeded with the first observation (the non-adjusted EMA), so
// every output index is defined.  During the first `period` samples this
// differs from a bias-corrected or SMA-seeded EMA; MACD and RSI depend on this
// exact seeding.
// =============================================================================

use super::{ensure_finite_output, validate_period, validate_series, IndicatorResult};

/// Compute the EMA series for `series` with look-back `period`.
///
/// The output is aligned one-to-one with the input and `out[0] == series[0]`.
///
/// # Errors
/// `InvalidInput` when `period == 0`, the series is empty, or any value is
/// non-finite.
pub fn ema(series: &[f64], period: usize) -> IndicatorResult<Vec<f64>> {
    validate_period("EMA period", period)?;
    validate_series(series)?;
    let out = ema_unchecked(series, period);
    ensure_finite_output("EMA", &out)?;
    Ok(out)
}

/// EMA over an already validated series.
///
/// Shared with MACD (whose signal line is an EMA of an EMA difference) and RSI
/// (which smooths derived gain/loss series).
pub(crate) fn ema_unchecked(series: &[f64], period: usize) -> Vec<f64> {
    let multiplier = 2.0 / (period as f64 + 1.0);

    let mut result = Vec::with_capacity(series.len());
    let mut prev = match series.first() {
        Some(&seed) => seed,
        None => return result,
    };
    result.push(prev);

    for &value in &series[1..] {
        prev = value * multiplier + prev * (1.0 - multiplier);
        result.push(prev);
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorError;

    #[test]
    fn ema_empty_input() {
        assert!(matches!(ema(&[], 5), Err(IndicatorError::InvalidInput(_))));
    }

    #[test]
    fn ema_period_zero() {
        assert!(matches!(
            ema(&[1.0, 2.0, 3.0], 0),
            Err(IndicatorError::InvalidInput(_))
        ));
    }

    #[test]
    fn ema_seeds_with_first_value() {
        for period in 1..10 {
            let out = ema(&[42.5, 1.0, 7.0], period).unwrap();
            assert_eq!(out[0], 42.5);
        }
    }

    #[test]
    fn ema_single_element() {
        assert_eq!(ema(&[7.0], 20).unwrap(), vec![7.0]);
    }

    #[test]
    fn ema_known_values() {
        // 3-period EMA, multiplier = 0.5
        let out = ema(&[1.0, 2.0, 3.0, 4.0], 3).unwrap();
        let expected = [1.0, 1.5, 2.25, 3.125];
        assert_eq!(out.len(), expected.len());
        for (a, b) in out.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12, "got {a}, expected {b}");
        }
    }

    #[test]
    fn ema_period_one_tracks_input() {
        let series = vec![5.0, 9.0, 2.0, 11.0];
        assert_eq!(ema(&series, 1).unwrap(), series);
    }

    #[test]
    fn ema_period_longer_than_series_is_defined() {
        let out = ema(&[10.0, 20.0], 50).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn ema_converges_on_flat_series() {
        let out = ema(&vec![100.0; 64], 9).unwrap();
        assert!(out.iter().all(|v| (v - 100.0).abs() < 1e-12));
    }

    #[test]
    fn ema_rejects_infinite_values() {
        assert!(ema(&[1.0, f64::NEG_INFINITY], 3).is_err());
    }
}
