// =============================================================================
// Moving-average crossover (golden cross / death cross)
// =============================================================================
//
// Given a fast and a slow average aligned on the same index, emit:
//   Golden — fast moves from <= slow to > slow
//   Death  — fast moves from >  slow to <= slow
// Undefined entries on either side (or on the previous bar) never signal.

use serde::Serialize;

use super::{IndicatorError, IndicatorResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CrossSignal {
    Golden,
    Death,
}

/// Detect crossovers between two aligned series.
///
/// # Errors
/// `InvalidInput` when the two series differ in length.
pub fn crossover_signals(
    fast: &[Option<f64>],
    slow: &[Option<f64>],
) -> IndicatorResult<Vec<Option<CrossSignal>>> {
    if fast.len() != slow.len() {
        return Err(IndicatorError::InvalidInput(format!(
            "crossover series differ in length ({} vs {})",
            fast.len(),
            slow.len()
        )));
    }

    let above: Vec<Option<bool>> = fast
        .iter()
        .zip(slow.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f > s),
            _ => None,
        })
        .collect();

    let mut out = Vec::with_capacity(above.len());
    for i in 0..above.len() {
        let signal = match (i.checked_sub(1).and_then(|p| above[p]), above[i]) {
            (Some(false), Some(true)) => Some(CrossSignal::Golden),
            (Some(true), Some(false)) => Some(CrossSignal::Death),
            _ => None,
        };
        out.push(signal);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::sma;

    #[test]
    fn detects_golden_and_death_cross() {
        let fast = vec![Some(1.0), Some(2.0), Some(4.0), Some(3.0), Some(1.0)];
        let slow = vec![Some(2.0), Some(2.0), Some(3.0), Some(3.0), Some(3.0)];
        let out = crossover_signals(&fast, &slow).unwrap();
        assert_eq!(
            out,
            vec![None, None, Some(CrossSignal::Golden), Some(CrossSignal::Death), None]
        );
    }

    #[test]
    fn undefined_entries_never_signal() {
        let fast = vec![None, Some(5.0), Some(1.0)];
        let slow = vec![Some(1.0), Some(1.0), None];
        assert_eq!(crossover_signals(&fast, &slow).unwrap(), vec![None, None, None]);
    }

    #[test]
    fn length_mismatch_rejected() {
        assert!(crossover_signals(&[Some(1.0)], &[]).is_err());
    }

    #[test]
    fn v_shaped_prices_produce_golden_cross() {
        let prices: Vec<f64> = (0..20)
            .map(|i| if i < 10 { 100.0 - i as f64 } else { 80.0 + i as f64 * 2.0 })
            .collect();
        let fast = sma(&prices, 3).unwrap();
        let slow = sma(&prices, 8).unwrap();
        let out = crossover_signals(&fast, &slow).unwrap();
        assert!(out.contains(&Some(CrossSignal::Golden)));
        assert!(!out.contains(&Some(CrossSignal::Death)));
    }
}
