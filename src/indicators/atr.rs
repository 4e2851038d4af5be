// =============================================================================
// Average True Range (ATR) — rolling mean with a minimum window of one
// =============================================================================
//
// ATR measures market volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar:
//   TR_0 = H - L                                  (no previous close)
//   TR_i = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is the simple mean of the most recent `period` TR values.  Until
// `period` bars are available the mean runs over however many bars exist, so
// ATR is defined from the first candle onward.
//
// Default period: 14
// =============================================================================

use super::{ensure_finite_output, validate_candles, validate_period, IndicatorResult};
use crate::market_data::Candle;

pub const DEFAULT_ATR_PERIOD: usize = 14;

/// True range per candle, aligned with the input.
///
/// # Errors
/// `InvalidInput` when the slice is empty, contains non-finite values, or is
/// not strictly ascending by timestamp.
pub fn true_range(candles: &[Candle]) -> IndicatorResult<Vec<f64>> {
    validate_candles(candles)?;

    let mut tr_values = Vec::with_capacity(candles.len());
    tr_values.push(candles[0].high - candles[0].low);

    for w in candles.windows(2) {
        let prev_close = w[0].close;
        let (high, low) = (w[1].high, w[1].low);

        let hl = high - low;
        let hc = (high - prev_close).abs();
        let lc = (low - prev_close).abs();

        tr_values.push(hl.max(hc).max(lc));
    }

    ensure_finite_output("true range", &tr_values)?;
    Ok(tr_values)
}

/// Compute the ATR series for `candles` (oldest first).
///
/// # Errors
/// `InvalidInput` when `period == 0` or the candles fail validation (see
/// [`true_range`]).
pub fn atr(candles: &[Candle], period: usize) -> IndicatorResult<Vec<f64>> {
    validate_period("ATR period", period)?;
    let tr_values = true_range(candles)?;

    let out = (0..tr_values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(period);
            let window = &tr_values[start..=i];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect();

    Ok(out)
}

/// Most recent ATR value as a percentage of the last close.
///
/// Useful for comparing volatility across markets with different price
/// scales.  Returns `None` when the last close is zero.
pub fn atr_pct(candles: &[Candle], period: usize) -> IndicatorResult<Option<f64>> {
    let series = atr(candles, period)?;
    let (last_atr, last_close) = match (series.last(), candles.last()) {
        (Some(&a), Some(c)) => (a, c.close),
        _ => return Ok(None),
    };
    if last_close == 0.0 {
        return Ok(None);
    }
    Ok(Some(last_atr / last_close * 100.0))
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorError;

    /// Build a test candle; timestamps are one minute apart.
    fn candle(i: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(i * 60_000, open, high, low, close, 100.0)
    }

    #[test]
    fn atr_period_zero() {
        let candles = vec![candle(0, 100.0, 105.0, 95.0, 102.0)];
        assert!(matches!(atr(&candles, 0), Err(IndicatorError::InvalidInput(_))));
    }

    #[test]
    fn atr_empty_input() {
        assert!(matches!(atr(&[], 14), Err(IndicatorError::InvalidInput(_))));
    }

    #[test]
    fn atr_first_row_is_high_minus_low() {
        let candles = vec![
            candle(0, 100.0, 104.0, 97.5, 101.0),
            candle(1, 101.0, 103.0, 99.0, 102.0),
        ];
        for period in 1..5 {
            let out = atr(&candles, period).unwrap();
            assert_eq!(out[0], 104.0 - 97.5);
        }
    }

    #[test]
    fn true_range_uses_prev_close() {
        // Gap scenario: |H - prevClose| > H - L
        let candles = vec![
            candle(0, 100.0, 105.0, 95.0, 95.0),  // close at low
            candle(1, 110.0, 115.0, 108.0, 112.0), // gap up: |115-95|=20 > 7
            candle(2, 112.0, 113.0, 100.0, 101.0), // gap down: |100-112|=12 < 13
        ];
        let tr = true_range(&candles).unwrap();
        assert_eq!(tr, vec![10.0, 20.0, 13.0]);
    }

    #[test]
    fn atr_grows_window_until_period() {
        let candles = vec![
            candle(0, 100.0, 102.0, 98.0, 100.0), // TR 4
            candle(1, 100.0, 101.0, 99.0, 100.0), // TR 2
            candle(2, 100.0, 106.0, 100.0, 103.0), // TR 6
            candle(3, 103.0, 104.0, 102.0, 103.0), // TR 2
        ];
        let out = atr(&candles, 3).unwrap();
        let expected = [4.0, 3.0, 4.0, 10.0 / 3.0];
        for (a, b) in out.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-10, "got {a}, expected {b}");
        }
    }

    #[test]
    fn atr_constant_range() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| {
                let base = 100.0;
                candle(i, base, base + 5.0, base - 5.0, base)
            })
            .collect();
        let out = atr(&candles, 14).unwrap();
        assert!(out.iter().all(|v| (v - 10.0).abs() < 1e-10));
    }

    #[test]
    fn atr_rejects_nan() {
        let candles = vec![
            candle(0, 100.0, 105.0, 95.0, 100.0),
            candle(1, 100.0, f64::NAN, 95.0, 100.0),
        ];
        assert!(atr(&candles, 3).is_err());
    }

    #[test]
    fn atr_pct_relative_to_close() {
        let candles = vec![
            candle(0, 200.0, 202.0, 198.0, 200.0),
            candle(1, 200.0, 202.0, 198.0, 200.0),
        ];
        let pct = atr_pct(&candles, 14).unwrap().unwrap();
        assert!((pct - 2.0).abs() < 1e-10);
    }

    #[test]
    fn true_range_overflow_is_rejected() {
        let candles = vec![candle(0, 0.0, 1e308, -1e308, 0.0)];
        assert!(matches!(
            true_range(&candles),
            Err(IndicatorError::InvalidInput(_))
        ));
        assert!(atr(&candles, 14).is_err());
    }
}
