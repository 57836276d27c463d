//! Index hedge sizing and the market-regime delta target.
//!
//! Gaps are measured in index-equivalent shares. Option hedges assume an
//! at-the-money index contract, i.e. 50 shares of delta per contract.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use optdesk_core::config::{MarketConfig, RiskConfig};
use optdesk_core::indicators;
use optdesk_core::OptionType;
use optdesk_market_data::{closes, MarketDataProvider};

const ATM_CONTRACT_DELTA: f64 = 0.50 * 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    /// Index above its long average with calm volatility.
    Bull,
    /// Index below its long average, or volatility in stress.
    Defensive,
    Sideways,
}

impl MarketRegime {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bull => "bull",
            Self::Defensive => "defensive",
            Self::Sideways => "sideways",
        }
    }

    /// Classifies the market from the index level, its long moving average and
    /// the volatility index. A missing average only rules out `Bull`.
    #[must_use]
    pub fn classify(
        index_price: f64,
        long_sma: Option<f64>,
        vix: f64,
        config: &RiskConfig,
    ) -> Self {
        match long_sma {
            Some(sma) if index_price > sma && vix < config.regime_calm_vix => Self::Bull,
            Some(sma) if index_price < sma => Self::Defensive,
            _ if vix > config.regime_stress_vix => Self::Defensive,
            _ => Self::Sideways,
        }
    }

    /// Target index-equivalent delta for `capital`.
    #[must_use]
    pub fn target_delta(&self, capital: f64) -> f64 {
        match self {
            Self::Bull => capital * 0.002,
            Self::Defensive => 0.0,
            Self::Sideways => capital * 0.0005,
        }
    }
}

/// Regime and the delta target it implies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeAssessment {
    pub regime: MarketRegime,
    pub long_sma: Option<f64>,
    pub vix: f64,
    pub target_delta: f64,
}

/// Reads the index's long moving average and the volatility index.
///
/// A failed volatility quote uses the configured fallback level.
pub async fn assess_regime(
    provider: &dyn MarketDataProvider,
    market: &MarketConfig,
    risk: &RiskConfig,
    index_price: f64,
    capital: f64,
) -> RegimeAssessment {
    let lookback = u32::try_from(risk.regime_sma_period * 2).unwrap_or(u32::MAX);
    let long_sma = match provider.historical_series(&market.reference_index, lookback).await {
        Ok(history) => indicators::sma(&closes(&history), risk.regime_sma_period),
        Err(e) => {
            warn!(
                index = %market.reference_index,
                error = %e,
                "Index history unavailable for regime"
            );
            None
        }
    };
    let vix = match provider.quote(&market.volatility_index).await {
        Ok(quote) if quote.last > 0.0 => quote.last,
        Ok(_) => risk.fallback_vix,
        Err(e) => {
            warn!(error = %e, fallback = risk.fallback_vix, "Volatility index unavailable");
            risk.fallback_vix
        }
    };
    let regime = MarketRegime::classify(index_price, long_sma, vix, risk);
    debug!(regime = regime.as_str(), ?long_sma, vix, "Market regime assessed");
    RegimeAssessment {
        regime,
        long_sma,
        vix,
        target_delta: regime.target_delta(capital),
    }
}

/// Trades that would close the gap between the book and a delta target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HedgeRequirement {
    /// `target - current`, rounded to cents.
    pub delta_gap: f64,
    /// Index shares to buy (positive) or sell (negative).
    pub index_shares: i64,
    /// At-the-money index options to buy.
    pub option_contracts: u32,
    /// Put to reduce delta, call to add it.
    pub option_type: OptionType,
}

#[must_use]
pub fn hedge_requirement(current_delta: f64, target_delta: f64) -> HedgeRequirement {
    let gap = target_delta - current_delta;
    HedgeRequirement {
        delta_gap: (gap * 100.0).round() / 100.0,
        index_shares: gap.round() as i64,
        option_contracts: (gap / ATM_CONTRACT_DELTA).round().abs() as u32,
        option_type: if gap < 0.0 {
            OptionType::Put
        } else {
            OptionType::Call
        },
    }
}

/// Hedge the desk would place on its own, or `None` inside the `min_gap` band.
#[must_use]
pub fn autonomous_hedge(
    current_delta: f64,
    target_delta: f64,
    min_gap: f64,
) -> Option<HedgeRequirement> {
    let gap = target_delta - current_delta;
    if gap.abs() < min_gap {
        return None;
    }
    let requirement = hedge_requirement(current_delta, target_delta);
    (requirement.option_contracts > 0).then_some(requirement)
}
