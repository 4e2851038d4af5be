// =============================================================================
// ATR-based stop-loss / target levels
// =============================================================================
//
//   stop_loss = price - atr * multiplier
//   target    = price + atr * multiplier

use serde::Serialize;

use super::{IndicatorError, IndicatorResult};

pub const DEFAULT_ATR_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskLevels {
    pub stop_loss: f64,
    pub target: f64,
}

/// Symmetric stop-loss and target around `current_price`.
///
/// No rounding is applied; a large ATR may legitimately produce a negative
/// stop-loss.
pub fn stop_loss_and_target(
    current_price: f64,
    atr_value: f64,
    multiplier: f64,
) -> IndicatorResult<RiskLevels> {
    for (name, v) in [
        ("current price", current_price),
        ("ATR", atr_value),
        ("ATR multiplier", multiplier),
    ] {
        if !v.is_finite() {
            return Err(IndicatorError::InvalidInput(format!(
                "{name} must be a finite number, got {v}"
            )));
        }
    }

    let offset = atr_value * multiplier;
    Ok(RiskLevels {
        stop_loss: current_price - offset,
        target: current_price + offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_default_multiplier() {
        let levels = stop_loss_and_target(50_000.0, 1_250.0, DEFAULT_ATR_MULTIPLIER).unwrap();
        assert_eq!(levels.stop_loss, 47_500.0);
        assert_eq!(levels.target, 52_500.0);
    }

    #[test]
    fn levels_zero_atr_collapse_to_price() {
        let levels = stop_loss_and_target(10.0, 0.0, 3.0).unwrap();
        assert_eq!(levels, RiskLevels { stop_loss: 10.0, target: 10.0 });
    }

    #[test]
    fn levels_reject_nan() {
        assert!(stop_loss_and_target(f64::NAN, 1.0, 2.0).is_err());
        assert!(stop_loss_and_target(1.0, f64::INFINITY, 2.0).is_err());
    }
}
