//! Exit and roll rules for single-leg option positions.
//!
//! The same tree drives paper-position transitions and the per-position
//! advice in risk reports. Short premium checks, in order: profit target,
//! stop loss, delta roll, DTE exit. Long premium: profit target, stop loss,
//! decay exit.

use serde::{Deserialize, Serialize};

use optdesk_core::config::LifecycleConfig;

use crate::types::ExitReason;

/// Thresholds as fractions of the entry premium.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitRules {
    pub short_profit_target: f64,
    pub short_stop_loss: f64,
    pub long_profit_target: f64,
    pub long_stop_loss: f64,
    pub exit_dte: i64,
    pub roll_delta: f64,
}

impl Default for ExitRules {
    fn default() -> Self {
        Self::from(&LifecycleConfig::default())
    }
}

impl From<&LifecycleConfig> for ExitRules {
    fn from(config: &LifecycleConfig) -> Self {
        Self {
            short_profit_target: config.short_profit_target,
            short_stop_loss: config.short_stop_loss,
            long_profit_target: config.long_profit_target,
            long_stop_loss: config.long_stop_loss,
            exit_dte: config.exit_dte,
            roll_delta: config.roll_delta,
        }
    }
}

/// Return on the entry premium from the holder's side.
///
/// A short gains as the option cheapens; a long gains as it appreciates.
/// Returns `None` for a non-positive entry price.
#[must_use]
pub fn pnl_fraction(quantity: i32, entry_price: f64, current_price: f64) -> Option<f64> {
    if !(entry_price > 0.0) {
        return None;
    }
    let change = (current_price - entry_price) / entry_price;
    Some(if quantity < 0 { -change } else { change })
}

impl ExitRules {
    /// First triggered rule, or `None` to hold.
    #[must_use]
    pub fn evaluate(
        &self,
        quantity: i32,
        pnl_fraction: f64,
        model_delta: f64,
        dte: i64,
    ) -> Option<ExitReason> {
        if quantity < 0 {
            if pnl_fraction >= self.short_profit_target {
                return Some(ExitReason::ProfitTarget);
            }
            if pnl_fraction <= -self.short_stop_loss {
                return Some(ExitReason::StopLoss);
            }
            if model_delta.abs() >= self.roll_delta {
                return Some(ExitReason::Roll);
            }
        } else {
            if pnl_fraction >= self.long_profit_target {
                return Some(ExitReason::ProfitTarget);
            }
            if pnl_fraction <= -self.long_stop_loss {
                return Some(ExitReason::StopLoss);
            }
        }
        if dte <= self.exit_dte {
            return Some(ExitReason::TimeExit);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_credit_halved_takes_profit() {
        let rules = ExitRules::default();
        let pnl = pnl_fraction(-1, 5.00, 2.00).unwrap();
        assert!((pnl - 0.60).abs() < 1e-12);
        assert_eq!(rules.evaluate(-1, pnl, -0.10, 30), Some(ExitReason::ProfitTarget));
    }

    #[test]
    fn short_loss_beyond_150_percent_stops() {
        let rules = ExitRules::default();
        let pnl = pnl_fraction(-1, 2.00, 5.00).unwrap();
        assert_eq!(rules.evaluate(-1, pnl, -0.55, 30), Some(ExitReason::StopLoss));
    }

    #[test]
    fn short_delta_expansion_rolls_before_dte_exit() {
        let rules = ExitRules::default();
        let pnl = pnl_fraction(-1, 2.00, 2.60).unwrap();
        assert_eq!(rules.evaluate(-1, pnl, -0.42, 10), Some(ExitReason::Roll));
        assert_eq!(rules.evaluate(-1, pnl, 0.40, 30), Some(ExitReason::Roll));
        assert_eq!(rules.evaluate(-1, pnl, -0.30, 21), Some(ExitReason::TimeExit));
        assert_eq!(rules.evaluate(-1, pnl, -0.30, 22), None);
    }

    #[test]
    fn long_rules() {
        let rules = ExitRules::default();
        assert_eq!(
            rules.evaluate(2, pnl_fraction(2, 3.0, 6.0).unwrap(), 0.7, 40),
            Some(ExitReason::ProfitTarget)
        );
        assert_eq!(
            rules.evaluate(2, pnl_fraction(2, 3.0, 1.5).unwrap(), 0.2, 40),
            Some(ExitReason::StopLoss)
        );
        // Longs never roll on delta.
        assert_eq!(rules.evaluate(2, pnl_fraction(2, 3.0, 3.3).unwrap(), 0.9, 40), None);
        assert_eq!(
            rules.evaluate(2, pnl_fraction(2, 3.0, 3.3).unwrap(), 0.5, 14),
            Some(ExitReason::TimeExit)
        );
    }

    #[test]
    fn zero_entry_has_no_pnl() {
        assert!(pnl_fraction(-1, 0.0, 1.0).is_none());
    }
}
