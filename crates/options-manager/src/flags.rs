//! Portfolio-level risk classification of a [`RiskSnapshot`] against capital.

use serde::{Deserialize, Serialize};

use optdesk_core::config::RiskConfig;

use crate::aggregator::RiskSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaState {
    Neutral,
    /// Long index-equivalent exposure beyond the limit.
    OverLong,
    /// Short index-equivalent exposure beyond the limit.
    OverShort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GammaState {
    Neutral,
    Fragile,
    Antifragile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThetaState {
    Healthy,
    Low,
    Excessive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginState {
    Normal,
    Warning,
    /// Stop opening new positions.
    Critical,
}

/// Capital-relative metrics and their classifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFlags {
    pub delta_exposure: f64,
    pub delta_exposure_pct: f64,
    pub delta: DeltaState,
    pub gamma_threshold: f64,
    pub gamma: GammaState,
    pub theta_yield_pct: f64,
    pub theta: ThetaState,
    pub margin_pct: f64,
    pub margin: MarginState,
}

impl RiskFlags {
    /// Classifies `snapshot` for an owner with `capital`.
    ///
    /// Non-positive capital reports every percentage as zero.
    #[must_use]
    pub fn evaluate(snapshot: &RiskSnapshot, capital: f64, config: &RiskConfig) -> Self {
        let pct = |value: f64| if capital > 0.0 { value / capital * 100.0 } else { 0.0 };

        let delta_exposure = snapshot.delta_exposure();
        let delta_exposure_pct = pct(delta_exposure);
        let delta = if delta_exposure_pct > config.delta_exposure_pct {
            DeltaState::OverLong
        } else if delta_exposure_pct < -config.delta_exposure_pct {
            DeltaState::OverShort
        } else {
            DeltaState::Neutral
        };

        let gamma_threshold = capital.max(0.0) / 10_000.0 * config.gamma_per_10k;
        let gamma = if snapshot.weighted_gamma < -gamma_threshold {
            GammaState::Fragile
        } else if snapshot.weighted_gamma > gamma_threshold {
            GammaState::Antifragile
        } else {
            GammaState::Neutral
        };

        let theta_yield_pct = pct(snapshot.daily_theta);
        let theta = if theta_yield_pct < config.theta_low_pct {
            ThetaState::Low
        } else if theta_yield_pct > config.theta_high_pct {
            ThetaState::Excessive
        } else {
            ThetaState::Healthy
        };

        let margin_pct = pct(snapshot.margin_used);
        let margin = if margin_pct > config.margin_critical_pct {
            MarginState::Critical
        } else if margin_pct > config.margin_warn_pct {
            MarginState::Warning
        } else {
            MarginState::Normal
        };

        Self {
            delta_exposure,
            delta_exposure_pct,
            delta,
            gamma_threshold,
            gamma,
            theta_yield_pct,
            theta,
            margin_pct,
            margin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(delta: f64, gamma: f64, theta: f64, margin: f64) -> RiskSnapshot {
        RiskSnapshot {
            weighted_delta: delta,
            weighted_gamma: gamma,
            daily_theta: theta,
            margin_used: margin,
            reference_index_price: 500.0,
            ..RiskSnapshot::default()
        }
    }

    #[test]
    fn classifies_against_capital() {
        let config = RiskConfig::default();
        // 20 index shares at 500 = $10k = 20% of $50k.
        let flags = RiskFlags::evaluate(&snapshot(20.0, -12.0, 100.0, 20_000.0), 50_000.0, &config);
        assert_eq!(flags.delta, DeltaState::OverLong);
        assert!((flags.gamma_threshold - 10.0).abs() < 1e-12);
        assert_eq!(flags.gamma, GammaState::Fragile);
        assert!((flags.theta_yield_pct - 0.2).abs() < 1e-12);
        assert_eq!(flags.theta, ThetaState::Healthy);
        assert!((flags.margin_pct - 40.0).abs() < 1e-12);
        assert_eq!(flags.margin, MarginState::Warning);
    }

    #[test]
    fn opposite_extremes() {
        let config = RiskConfig::default();
        let flags = RiskFlags::evaluate(&snapshot(-20.0, 12.0, 200.0, 30_000.0), 50_000.0, &config);
        assert_eq!(flags.delta, DeltaState::OverShort);
        assert_eq!(flags.gamma, GammaState::Antifragile);
        assert_eq!(flags.theta, ThetaState::Excessive);
        assert_eq!(flags.margin, MarginState::Critical);

        let idle = RiskFlags::evaluate(&snapshot(0.0, 0.0, 10.0, 0.0), 50_000.0, &config);
        assert_eq!(idle.delta, DeltaState::Neutral);
        assert_eq!(idle.theta, ThetaState::Low);
        assert_eq!(idle.margin, MarginState::Normal);
    }
}
