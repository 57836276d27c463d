//! Volatility-risk-premium and expected-move gates.

use serde::{Deserialize, Serialize};

use optdesk_core::{ContractCandidate, OptionType, Strategy};
use optdesk_market_data::OptionChain;

/// Implied minus realized volatility, in vol points (0.05 = 5%).
#[must_use]
pub fn volatility_risk_premium(implied_vol: f64, realized_vol: f64) -> f64 {
    implied_vol - realized_vol
}

/// Credit trades need a non-negative premium; debit trades reject one above `max_debit_premium`.
#[must_use]
pub fn vrp_allows(strategy: Strategy, premium: f64, max_debit_premium: f64) -> bool {
    if strategy.is_credit() {
        premium >= 0.0
    } else {
        premium <= max_debit_premium
    }
}

/// One-sigma move band over the contract's life.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedMove {
    pub amount: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ExpectedMove {
    /// `spot * iv * sqrt(dte / 365)`.
    #[must_use]
    pub fn new(spot: f64, implied_vol: f64, dte: i64) -> Self {
        let amount = spot * implied_vol * (dte.max(0) as f64 / 365.0).sqrt();
        Self {
            amount,
            lower: spot - amount,
            upper: spot + amount,
        }
    }
}

/// Breakeven of a short option at expiry, or `None` for long strategies.
#[must_use]
pub fn credit_breakeven(strategy: Strategy, candidate: &ContractCandidate) -> Option<f64> {
    match strategy {
        Strategy::SellPut => Some(candidate.strike - candidate.bid),
        Strategy::SellCall => Some(candidate.strike + candidate.bid),
        Strategy::BuyCall | Strategy::BuyPut => None,
    }
}

/// Whether a short option's breakeven sits outside the one-sigma band.
#[must_use]
pub fn breakeven_outside_band(strategy: Strategy, breakeven: f64, band: &ExpectedMove) -> bool {
    match strategy.option_type() {
        OptionType::Put => breakeven <= band.lower,
        OptionType::Call => breakeven >= band.upper,
    }
}

/// Strike to sell against a long option to form a vertical spread.
///
/// Uses the same-right strike nearest the band edge in the trade's direction,
/// skipping the bought strike itself.
#[must_use]
pub fn hedge_strike(
    strategy: Strategy,
    candidate: &ContractCandidate,
    chain: &OptionChain,
    band: &ExpectedMove,
) -> Option<f64> {
    let edge = match strategy {
        Strategy::BuyCall => band.upper,
        Strategy::BuyPut => band.lower,
        Strategy::SellPut | Strategy::SellCall => return None,
    };
    chain
        .side(candidate.option_type)
        .iter()
        .map(|row| row.strike)
        .filter(|strike| (strike - candidate.strike).abs() > 1e-6)
        .min_by(|a, b| (a - edge).abs().total_cmp(&(b - edge).abs()))
}
