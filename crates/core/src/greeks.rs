//! Black-Scholes-Merton greeks for European equity options.
//!
//! Every consumer in the desk goes through [`compute`] (or [`model_delta`]) so the
//! pricing primitive can be swapped without touching the signal or risk code.

use std::f64::consts::PI;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::OptionType;

/// Implied vols at or below this are treated as missing.
pub const MIN_USABLE_IV: f64 = 0.01;

const DAYS_PER_YEAR: f64 = 365.0;

/// Inputs to the greeks primitive.
#[derive(Debug, Clone, Copy)]
pub struct GreeksInput {
    pub spot: f64,
    pub strike: f64,
    /// Time to expiry in years.
    pub years: f64,
    pub rate: f64,
    pub implied_vol: f64,
    pub dividend_yield: f64,
    pub option_type: OptionType,
}

/// Per-share sensitivities. Theta is per calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
}

/// Year fraction between `today` and `expiry`, floored at one day.
#[must_use]
pub fn year_fraction(expiry: NaiveDate, today: NaiveDate) -> f64 {
    let days = (expiry - today).num_days().max(1);
    days as f64 / DAYS_PER_YEAR
}

/// Computes delta, gamma and theta.
///
/// Returns `None` when the inputs cannot be priced (non-positive spot, strike,
/// time or an unusable implied vol).
#[must_use]
pub fn compute(input: &GreeksInput) -> Option<Greeks> {
    let GreeksInput {
        spot,
        strike,
        years,
        rate,
        implied_vol: sigma,
        dividend_yield: q,
        option_type,
    } = *input;

    if !(spot > 0.0 && strike > 0.0 && years > 0.0) || !(sigma > MIN_USABLE_IV) {
        return None;
    }

    let sqrt_t = years.sqrt();
    let d1 = ((spot / strike).ln() + (rate - q + 0.5 * sigma * sigma) * years) / (sigma * sqrt_t);
    let d2 = d1 - sigma * sqrt_t;
    let carry = (-q * years).exp();
    let discount = (-rate * years).exp();
    let pdf_d1 = norm_pdf(d1);

    let gamma = carry * pdf_d1 / (spot * sigma * sqrt_t);
    let decay = -spot * pdf_d1 * sigma * carry / (2.0 * sqrt_t);

    let (delta, theta_annual) = match option_type {
        OptionType::Call => (
            carry * norm_cdf(d1),
            decay - rate * strike * discount * norm_cdf(d2) + q * spot * carry * norm_cdf(d1),
        ),
        OptionType::Put => (
            carry * (norm_cdf(d1) - 1.0),
            decay + rate * strike * discount * norm_cdf(-d2) - q * spot * carry * norm_cdf(-d1),
        ),
    };

    Some(Greeks {
        delta,
        gamma,
        theta: theta_annual / DAYS_PER_YEAR,
    })
}

/// Model delta, or 0.0 when the contract cannot be priced.
#[must_use]
pub fn model_delta(input: &GreeksInput) -> f64 {
    compute(input).map_or(0.0, |g| g.delta)
}

/// Standard normal CDF (Abramowitz and Stegun 26.2.17).
#[must_use]
pub fn norm_cdf(x: f64) -> f64 {
    if x.is_nan() {
        return 0.5;
    }
    if x < -38.0 {
        return 0.0;
    }
    if x > 38.0 {
        return 1.0;
    }

    const A: [f64; 5] = [
        0.319_381_530,
        -0.356_563_782,
        1.781_477_937,
        -1.821_255_978,
        1.330_274_429,
    ];
    const P: f64 = 0.231_641_9;

    let z = x.abs();
    let t = 1.0 / (1.0 + P * z);
    let poly = t * (A[0] + t * (A[1] + t * (A[2] + t * (A[3] + t * A[4]))));
    let upper = 1.0 - norm_pdf(z) * poly;

    if x < 0.0 {
        1.0 - upper
    } else {
        upper
    }
}

/// Standard normal density.
#[must_use]
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(option_type: OptionType, strike: f64, vol: f64) -> GreeksInput {
        GreeksInput {
            spot: 100.0,
            strike,
            years: 30.0 / 365.0,
            rate: 0.042,
            implied_vol: vol,
            dividend_yield: 0.0,
            option_type,
        }
    }

    #[test]
    fn norm_cdf_at_zero_is_half() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-7);
    }

    #[test]
    fn norm_cdf_symmetry() {
        for x in [0.3, 1.0, 1.96, 2.5] {
            assert!((norm_cdf(x) + norm_cdf(-x) - 1.0).abs() < 1e-7);
        }
        assert!((norm_cdf(1.96) - 0.975).abs() < 1e-3);
    }

    #[test]
    fn atm_call_delta_slightly_above_half() {
        let g = compute(&input(OptionType::Call, 100.0, 0.30)).unwrap();
        assert!(g.delta > 0.5 && g.delta < 0.56, "delta = {}", g.delta);
        assert!(g.gamma > 0.0);
        assert!(g.theta < 0.0);
    }

    #[test]
    fn put_call_delta_parity_without_dividends() {
        let call = compute(&input(OptionType::Call, 95.0, 0.25)).unwrap();
        let put = compute(&input(OptionType::Put, 95.0, 0.25)).unwrap();
        assert!((call.delta - put.delta - 1.0).abs() < 1e-9);
        assert!((call.gamma - put.gamma).abs() < 1e-12);
    }

    #[test]
    fn otm_put_delta_is_small_and_negative() {
        let delta = model_delta(&input(OptionType::Put, 88.0, 0.30));
        assert!(delta < 0.0 && delta > -0.25, "delta = {delta}");
    }

    #[test]
    fn unusable_iv_yields_zero_delta() {
        assert!(compute(&input(OptionType::Call, 100.0, 0.005)).is_none());
        assert_eq!(model_delta(&input(OptionType::Call, 100.0, 0.0)), 0.0);
    }

    #[test]
    fn year_fraction_floors_at_one_day() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
        assert!((year_fraction(today, today) - 1.0 / 365.0).abs() < 1e-12);
        let expiry = NaiveDate::from_ymd_opt(2025, 4, 19).unwrap();
        assert!((year_fraction(expiry, today) - 30.0 / 365.0).abs() < 1e-12);
    }
}
