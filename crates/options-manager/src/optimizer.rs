//! Pre-trade exposure limits.
//!
//! Works in index-equivalent shares. A candidate's unit impact is its
//! one-contract index delta, flipped for credit strategies since selling the
//! option takes the opposite side of its delta.

use serde::{Deserialize, Serialize};

use optdesk_core::Strategy;

/// Largest tradeable quantity, or the index hedge needed when none fits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerDecision {
    /// Limit in index-equivalent shares.
    pub max_safe_shares: f64,
    /// Signed index-share impact of one contract.
    pub unit_impact: f64,
    pub safe_quantity: u32,
    /// Index shares to trade alongside one contract to land back on the limit.
    /// Negative sells the index, positive buys it, 0 when no hedge is needed.
    pub hedge_shares: f64,
}

impl OptimizerDecision {
    #[must_use]
    pub fn permits_entry(&self) -> bool {
        self.safe_quantity > 0
    }
}

/// Signed index-share impact of one contract of `strategy`.
#[must_use]
pub fn unit_impact(strategy: Strategy, unit_index_delta: f64) -> f64 {
    if strategy.is_credit() {
        -unit_index_delta
    } else {
        unit_index_delta
    }
}

/// Safe quantity for a candidate against the current index-equivalent delta.
///
/// `limit_pct` bounds `|delta| * index_price` as a percentage of capital.
#[must_use]
pub fn optimize(
    current_delta: f64,
    unit_index_delta: f64,
    strategy: Strategy,
    capital: f64,
    index_price: f64,
    limit_pct: f64,
) -> OptimizerDecision {
    let max_safe_shares = if index_price > 0.0 {
        capital.max(0.0) * limit_pct / 100.0 / index_price
    } else {
        0.0
    };
    let impact = unit_impact(strategy, unit_index_delta);

    let raw = if impact > 0.0 {
        let room = max_safe_shares - current_delta;
        if room > 0.0 {
            (room / impact).floor()
        } else {
            0.0
        }
    } else if impact < 0.0 {
        let room = -max_safe_shares - current_delta;
        if room < 0.0 {
            (room / impact).floor()
        } else {
            0.0
        }
    } else {
        0.0
    };
    let safe_quantity = raw.clamp(0.0, f64::from(u32::MAX)) as u32;

    let mut hedge_shares = 0.0;
    if safe_quantity == 0 {
        let projected = current_delta + impact;
        let excess = if projected > max_safe_shares {
            projected - max_safe_shares
        } else if projected < -max_safe_shares {
            projected + max_safe_shares
        } else {
            0.0
        };
        hedge_shares = (-excess * 10.0).round() / 10.0;
    }

    OptimizerDecision {
        max_safe_shares,
        unit_impact: impact,
        safe_quantity,
        hedge_shares,
    }
}

/// Book delta and exposure after adding `contracts` of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureProjection {
    pub projected_delta: f64,
    pub projected_exposure_pct: f64,
}

#[must_use]
pub fn simulate_exposure(
    current_delta: f64,
    unit_index_delta: f64,
    strategy: Strategy,
    contracts: u32,
    capital: f64,
    index_price: f64,
) -> ExposureProjection {
    let projected_delta =
        current_delta + unit_impact(strategy, unit_index_delta) * f64::from(contracts);
    let projected_exposure_pct = if capital > 0.0 {
        projected_delta * index_price / capital * 100.0
    } else {
        0.0
    };
    ExposureProjection {
        projected_delta,
        projected_exposure_pct,
    }
}
