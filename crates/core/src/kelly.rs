//! Fractional-Kelly sizing for single-leg option trades.
//!
//! Credit trades treat the option as a bet that wins the credit with
//! probability `1 - |delta|` and risks the cash-secured margin. Debit trades
//! win the expected move net of premium with probability `|delta|`.
//!
//! ```text
//! f* = (p(b+1) - 1) / b
//! allocation = clamp(fraction * f*, 0, ceiling)
//! ```

use serde::{Deserialize, Serialize};

use crate::config::SizingConfig;
use crate::types::{PremiumSide, CONTRACT_MULTIPLIER};

/// Kelly sizer parameterised per premium side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsKellySizer {
    /// Fraction of Kelly to use (0.25 = quarter Kelly).
    pub fraction: f64,
    pub credit_ceiling: f64,
    pub debit_ceiling: f64,
    pub credit_min_return_pct: f64,
    pub debit_min_return_pct: f64,
    /// Allocation cap applied when converting to a contract count.
    pub contract_allocation_cap: f64,
}

impl Default for OptionsKellySizer {
    fn default() -> Self {
        Self::from(&SizingConfig::default())
    }
}

impl From<&SizingConfig> for OptionsKellySizer {
    fn from(config: &SizingConfig) -> Self {
        Self {
            fraction: config.kelly_fraction,
            credit_ceiling: config.credit_ceiling,
            debit_ceiling: config.debit_ceiling,
            credit_min_return_pct: config.credit_min_return_pct,
            debit_min_return_pct: config.debit_min_return_pct,
            contract_allocation_cap: config.contract_allocation_cap,
        }
    }
}

/// Result of sizing a proposed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingDecision {
    pub should_trade: bool,
    /// Fraction of capital to allocate, within `[0, ceiling]`.
    pub allocation_fraction: f64,
    /// Kelly fraction before scaling and clamping.
    pub full_kelly_fraction: f64,
    /// Capital tied up by one contract.
    pub margin_per_contract: f64,
    pub annualized_return_pct: f64,
    pub suggested_contracts: u32,
    pub reason: SizingReason,
}

impl SizingDecision {
    /// Whole contracts affordable from `capital` at this allocation, capped at `allocation_cap`.
    #[must_use]
    pub fn contracts_for(&self, capital: f64, allocation_cap: f64) -> u32 {
        if !self.should_trade || self.margin_per_contract <= 0.0 || capital <= 0.0 {
            return 0;
        }
        let budget = capital * self.allocation_fraction.min(allocation_cap);
        (budget / self.margin_per_contract).floor().max(0.0) as u32
    }

    fn rejected(
        reason: SizingReason,
        annualized_return_pct: f64,
        margin_per_contract: f64,
    ) -> Self {
        Self {
            should_trade: false,
            allocation_fraction: 0.0,
            full_kelly_fraction: 0.0,
            margin_per_contract,
            annualized_return_pct,
            suggested_contracts: 0,
            reason,
        }
    }
}

/// Reason for a sizing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizingReason {
    /// Return hurdle cleared.
    Accepted,
    /// Annualized return below the strategy's minimum.
    BelowReturnHurdle,
    /// Non-positive premium, margin, DTE or capital.
    InvalidInputs,
}

impl std::fmt::Display for SizingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::BelowReturnHurdle => write!(f, "below_return_hurdle"),
            Self::InvalidInputs => write!(f, "invalid_inputs"),
        }
    }
}

impl OptionsKellySizer {
    /// Sizes a short premium trade.
    ///
    /// Margin per share is `strike - credit`; annualized return on that capital
    /// must clear `credit_min_return_pct`.
    #[must_use]
    pub fn size_credit(
        &self,
        credit: f64,
        strike: f64,
        model_delta: f64,
        dte: i64,
        capital: f64,
    ) -> SizingDecision {
        let margin = strike - credit;
        let margin_per_contract = margin * CONTRACT_MULTIPLIER;
        if !(credit > 0.0 && margin > 0.0 && dte > 0 && capital > 0.0) {
            return SizingDecision::rejected(SizingReason::InvalidInputs, 0.0, margin_per_contract);
        }

        let annualized = annualize(credit / margin, dte);
        if annualized < self.credit_min_return_pct {
            return SizingDecision::rejected(
                SizingReason::BelowReturnHurdle,
                annualized,
                margin_per_contract,
            );
        }

        let b = credit / margin;
        let p = 1.0 - model_delta.abs();
        self.accept(PremiumSide::Credit, p, b, annualized, margin_per_contract, capital)
    }

    /// Sizes a long premium trade against the 1-sigma expected move in dollars.
    #[must_use]
    pub fn size_debit(
        &self,
        premium: f64,
        expected_move: f64,
        model_delta: f64,
        dte: i64,
        capital: f64,
    ) -> SizingDecision {
        let margin_per_contract = premium * CONTRACT_MULTIPLIER;
        if !(premium > 0.0 && dte > 0 && capital > 0.0) || !expected_move.is_finite() {
            return SizingDecision::rejected(SizingReason::InvalidInputs, 0.0, margin_per_contract);
        }

        let b = (expected_move - premium) / premium;
        let annualized = annualize(b, dte);
        if annualized < self.debit_min_return_pct {
            return SizingDecision::rejected(
                SizingReason::BelowReturnHurdle,
                annualized,
                margin_per_contract,
            );
        }

        let p = model_delta.abs();
        self.accept(PremiumSide::Debit, p, b, annualized, margin_per_contract, capital)
    }

    /// Allocation ceiling for the given side.
    #[must_use]
    pub fn ceiling(&self, side: PremiumSide) -> f64 {
        match side {
            PremiumSide::Credit => self.credit_ceiling,
            PremiumSide::Debit => self.debit_ceiling,
        }
    }

    /// Scales and clamps a full Kelly fraction into `[0, ceiling]`.
    #[must_use]
    pub fn clamp_allocation(&self, full_kelly: f64, side: PremiumSide) -> f64 {
        let scaled = self.fraction * full_kelly;
        if scaled.is_nan() {
            return 0.0;
        }
        scaled.max(0.0).min(self.ceiling(side))
    }

    fn accept(
        &self,
        side: PremiumSide,
        p: f64,
        b: f64,
        annualized: f64,
        margin_per_contract: f64,
        capital: f64,
    ) -> SizingDecision {
        let full = full_kelly(p, b);
        let mut decision = SizingDecision {
            should_trade: true,
            allocation_fraction: self.clamp_allocation(full, side),
            full_kelly_fraction: full,
            margin_per_contract,
            annualized_return_pct: annualized,
            suggested_contracts: 0,
            reason: SizingReason::Accepted,
        };
        decision.suggested_contracts =
            decision.contracts_for(capital, self.contract_allocation_cap);
        decision
    }
}

/// Full Kelly fraction for win probability `p` and net odds `b`.
///
/// Unbounded odds collapse to `p`; non-positive odds have no edge.
#[must_use]
pub fn full_kelly(p: f64, b: f64) -> f64 {
    if b.is_infinite() && b > 0.0 {
        return p;
    }
    if !(b > 0.0) {
        return 0.0;
    }
    (p * (b + 1.0) - 1.0) / b
}

fn annualize(period_return: f64, dte: i64) -> f64 {
    period_return * (365.0 / dte as f64) * 100.0
}
