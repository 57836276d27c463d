//! Quote quality gate.

use std::fmt;

use serde::{Deserialize, Serialize};

use optdesk_core::config::SignalConfig;
use optdesk_core::ContractCandidate;

/// Comparison tolerance so boundary spreads are not decided by float noise.
const EPSILON: f64 = 1e-9;

/// Which spread rule a contract was judged by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadRule {
    /// Spread as a percentage of mid.
    Relative,
    /// Absolute dollar spread, for contracts under the cheap-ask line.
    Absolute,
}

/// Liquidity diagnostics for an accepted contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityCheck {
    pub rule: SpreadRule,
    pub spread: f64,
    pub spread_pct: f64,
    /// Percent for the relative rule, dollars for the absolute rule.
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LiquidityReject {
    InvalidQuote { bid: f64, ask: f64 },
    WideSpread { rule: SpreadRule, spread: f64, threshold: f64 },
    LowOpenInterest(u64),
    LowVolume(u64),
}

impl fmt::Display for LiquidityReject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidQuote { bid, ask } => write!(f, "invalid quote {bid:.2}/{ask:.2}"),
            Self::WideSpread {
                rule: SpreadRule::Relative,
                spread,
                threshold,
            } => write!(f, "spread {spread:.1}% above {threshold:.1}%"),
            Self::WideSpread {
                rule: SpreadRule::Absolute,
                spread,
                threshold,
            } => write!(f, "spread ${spread:.2} above ${threshold:.2}"),
            Self::LowOpenInterest(oi) => write!(f, "open interest {oi}"),
            Self::LowVolume(v) => write!(f, "volume {v}"),
        }
    }
}

/// Relative spread threshold in percent for a contract's tenor and moneyness.
#[must_use]
pub fn relative_threshold(dte: i64, model_delta: f64, config: &SignalConfig) -> f64 {
    let mut threshold = config.base_spread_pct;
    if dte > config.long_dated_days {
        threshold += config.long_dated_spread_pct;
    }
    let abs_delta = model_delta.abs();
    if abs_delta > config.extreme_delta_high || abs_delta < config.extreme_delta_low {
        threshold += config.extreme_delta_spread_pct;
    }
    threshold
}

/// Accepts or rejects a candidate on quote validity, spread, open interest and volume.
///
/// # Errors
///
/// Returns the first failed check.
pub fn check_liquidity(
    candidate: &ContractCandidate,
    config: &SignalConfig,
) -> Result<LiquidityCheck, LiquidityReject> {
    let (bid, ask) = (candidate.bid, candidate.ask);
    if !(bid > 0.0 && ask > 0.0 && ask >= bid) {
        return Err(LiquidityReject::InvalidQuote { bid, ask });
    }

    let spread = ask - bid;
    let mid = (bid + ask) / 2.0;
    let spread_pct = spread / mid * 100.0;

    let check = if ask < config.cheap_contract_ask {
        LiquidityCheck {
            rule: SpreadRule::Absolute,
            spread,
            spread_pct,
            threshold: config.cheap_contract_max_spread,
        }
    } else {
        LiquidityCheck {
            rule: SpreadRule::Relative,
            spread,
            spread_pct,
            threshold: relative_threshold(candidate.dte, candidate.model_delta, config),
        }
    };

    let measured = match check.rule {
        SpreadRule::Absolute => spread,
        SpreadRule::Relative => spread_pct,
    };
    if measured > check.threshold + EPSILON {
        return Err(LiquidityReject::WideSpread {
            rule: check.rule,
            spread: measured,
            threshold: check.threshold,
        });
    }

    if candidate.open_interest < config.min_open_interest {
        return Err(LiquidityReject::LowOpenInterest(candidate.open_interest));
    }
    if candidate.volume < config.min_volume {
        return Err(LiquidityReject::LowVolume(candidate.volume));
    }
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use optdesk_core::OptionType;

    fn candidate(bid: f64, ask: f64, dte: i64, delta: f64) -> ContractCandidate {
        ContractCandidate {
            symbol: "AMD".into(),
            option_type: OptionType::Put,
            strike: 150.0,
            expiry: NaiveDate::from_ymd_opt(2025, 5, 16).unwrap(),
            dte,
            bid,
            ask,
            last: (bid + ask) / 2.0,
            implied_vol: 0.45,
            model_delta: delta,
            open_interest: 1_000,
            volume: 100,
        }
    }

    #[test]
    fn cheap_contract_uses_absolute_spread() {
        let cfg = SignalConfig::default();
        // 0.88/0.99: 11 cents wide on a sub-dollar ask.
        let err = check_liquidity(&candidate(0.88, 0.99, 35, -0.2), &cfg).unwrap_err();
        assert!(matches!(err, LiquidityReject::WideSpread { rule: SpreadRule::Absolute, .. }));

        let ok = check_liquidity(&candidate(0.89, 0.99, 35, -0.2), &cfg).unwrap();
        assert_eq!(ok.rule, SpreadRule::Absolute);
    }

    #[test]
    fn crossed_or_empty_quotes_rejected() {
        let cfg = SignalConfig::default();
        assert!(matches!(
            check_liquidity(&candidate(2.0, 1.9, 35, -0.2), &cfg),
            Err(LiquidityReject::InvalidQuote { .. })
        ));
        assert!(matches!(
            check_liquidity(&candidate(0.0, 1.9, 35, -0.2), &cfg),
            Err(LiquidityReject::InvalidQuote { .. })
        ));
    }

    #[test]
    fn threshold_widens_for_long_dated_and_extreme_delta() {
        let cfg = SignalConfig::default();
        assert_eq!(relative_threshold(35, -0.2, &cfg), 10.0);
        assert_eq!(relative_threshold(120, -0.2, &cfg), 15.0);
        assert_eq!(relative_threshold(120, 0.9, &cfg), 20.0);
        assert_eq!(relative_threshold(35, -0.10, &cfg), 15.0);
    }

    #[test]
    fn relative_spread_boundary() {
        let cfg = SignalConfig::default();
        // 12% wide passes only once the extreme-delta allowance applies.
        let wide = candidate(4.70, 5.30, 35, -0.2);
        assert!(check_liquidity(&wide, &cfg).is_err());
        let extreme = candidate(4.70, 5.30, 35, -0.10);
        assert!(check_liquidity(&extreme, &cfg).is_ok());
    }

    #[test]
    fn thin_open_interest_and_volume_rejected() {
        let cfg = SignalConfig::default();
        let mut c = candidate(2.50, 2.70, 35, -0.2);
        c.open_interest = 99;
        assert_eq!(check_liquidity(&c, &cfg), Err(LiquidityReject::LowOpenInterest(99)));
        c.open_interest = 100;
        c.volume = 9;
        assert_eq!(check_liquidity(&c, &cfg), Err(LiquidityReject::LowVolume(9)));
    }
}
