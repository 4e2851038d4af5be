// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Unweighted mean over a trailing window:
//   SMA_i = (close_{i-period+1} + ... + close_i) / period
//
// The window sum is maintained incrementally, so the whole series is produced
// in a single pass.
// =============================================================================

use super::{ensure_finite_output, validate_period, validate_series, IndicatorResult};

/// Compute the SMA series for `series` with look-back `period`.
///
/// The output has the same length as the input.  Index `i` is `None` while
/// `i < period - 1` (not enough history), and the trailing-window mean from
/// then on.  A period longer than the series is valid and yields all `None`.
///
/// # Errors
/// `InvalidInput` when `period == 0`, the series is empty, any value is
/// non-finite, or a window sum overflows.
pub fn sma(series: &[f64], period: usize) -> IndicatorResult<Vec<Option<f64>>> {
    validate_period("SMA period", period)?;
    validate_series(series)?;

    let period_f = period as f64;
    let mut out = Vec::with_capacity(series.len());
    let mut window_sum = 0.0_f64;

    for (i, &value) in series.iter().enumerate() {
        window_sum += value;
        if i >= period {
            window_sum -= series[i - period];
        }

        if i + 1 >= period {
            // Re-sum the window every `period` steps to cap drift from the
            // running add/subtract.
            if (i + 1) % period == 0 {
                window_sum = series[i + 1 - period..=i].iter().sum();
            }
            out.push(Some(window_sum / period_f));
        } else {
            out.push(None);
        }
    }

    ensure_finite_output("SMA", out.iter().flatten())?;
    Ok(out)
}
