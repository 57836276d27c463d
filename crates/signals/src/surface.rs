//! Volatility-surface readings: earnings move, term structure and vertical skew.
//!
//! Each reading is a pure function of chains already fetched by the engine, so
//! a missing chain degrades to "no reading" instead of failing the symbol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use optdesk_core::greeks::{self, GreeksInput, MIN_USABLE_IV};
use optdesk_core::OptionType;
use optdesk_market_data::OptionChain;

/// Expected earnings move implied by the at-the-money straddle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarningsWindow {
    pub earnings_date: NaiveDate,
    pub days_until: i64,
    /// Expiry whose straddle priced the move.
    pub expiry: NaiveDate,
    pub move_pct: f64,
    pub safe_lower: f64,
    pub safe_upper: f64,
}

/// Earliest expiry on or after the earnings date, in any listing order.
#[must_use]
pub fn covering_expiry(expirations: &[NaiveDate], earnings: NaiveDate) -> Option<NaiveDate> {
    expirations.iter().copied().filter(|exp| *exp >= earnings).min()
}

/// Prices the earnings move from the straddle nearest `spot`.
#[must_use]
pub fn earnings_move(
    chain: &OptionChain,
    spot: f64,
    earnings_date: NaiveDate,
    expiry: NaiveDate,
    today: NaiveDate,
) -> Option<EarningsWindow> {
    if spot <= 0.0 {
        return None;
    }
    let call = chain
        .nearest_strike(OptionType::Call, spot)
        .map_or(0.0, |row| row.mid_or_last());
    let put = chain
        .nearest_strike(OptionType::Put, spot)
        .map_or(0.0, |row| row.mid_or_last());
    let move_pct = (call + put) / spot * 100.0;
    Some(EarningsWindow {
        earnings_date,
        days_until: (earnings_date - today).num_days(),
        expiry,
        move_pct,
        safe_lower: spot * (1.0 - move_pct / 100.0),
        safe_upper: spot * (1.0 + move_pct / 100.0),
    })
}

/// Shape of the implied volatility term structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermState {
    /// Front month richer than back month.
    Inverted,
    Normal,
    Flat,
}

impl TermState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inverted => "inverted",
            Self::Normal => "normal",
            Self::Flat => "flat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermStructure {
    pub front_expiry: Option<NaiveDate>,
    pub back_expiry: Option<NaiveDate>,
    pub ratio: f64,
    pub state: TermState,
}

impl TermStructure {
    /// Neutral reading used when the two tenors cannot be compared.
    #[must_use]
    pub fn flat() -> Self {
        Self {
            front_expiry: None,
            back_expiry: None,
            ratio: 1.0,
            state: TermState::Flat,
        }
    }
}

/// Expiries nearest the front and back target tenors, if they differ.
#[must_use]
pub fn term_expiries(
    expirations: &[NaiveDate],
    today: NaiveDate,
    front_dte: i64,
    back_dte: i64,
) -> Option<(NaiveDate, NaiveDate)> {
    let nearest = |target: i64| {
        expirations
            .iter()
            .copied()
            .min_by_key(|exp| ((*exp - today).num_days() - target).abs())
    };
    let front = nearest(front_dte)?;
    let back = nearest(back_dte)?;
    (front != back).then_some((front, back))
}

/// Ratio of front to back at-the-money put IV, classified by the thresholds.
///
/// A back-month IV at or below the usable floor leaves the ratio at 1.0.
#[must_use]
pub fn term_structure(
    front: (NaiveDate, &OptionChain),
    back: (NaiveDate, &OptionChain),
    spot: f64,
    inversion: f64,
    normal: f64,
) -> Option<TermStructure> {
    let front_iv = front.1.nearest_strike(OptionType::Put, spot)?.implied_vol;
    let back_iv = back.1.nearest_strike(OptionType::Put, spot)?.implied_vol;
    let ratio = if back_iv > MIN_USABLE_IV { front_iv / back_iv } else { 1.0 };
    let state = if ratio >= inversion {
        TermState::Inverted
    } else if ratio <= normal {
        TermState::Normal
    } else {
        TermState::Flat
    };
    Some(TermStructure {
        front_expiry: Some(front.0),
        back_expiry: Some(back.0),
        ratio,
        state,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkewState {
    /// Downside protection bid well above upside.
    TailRisk,
    /// Upside calls priced above downside puts.
    CallSkewed,
    Neutral,
}

impl SkewState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TailRisk => "tail_risk",
            Self::CallSkewed => "call_skewed",
            Self::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalSkew {
    pub put_iv: f64,
    pub call_iv: f64,
    pub ratio: f64,
    pub state: SkewState,
}

/// Inputs shared by every model-delta evaluation on one chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainContext {
    pub spot: f64,
    pub years: f64,
    pub rate: f64,
    pub dividend_yield: f64,
}

impl ChainContext {
    /// Model delta of a row, 0.0 when its IV is unusable.
    #[must_use]
    pub fn delta(&self, option_type: OptionType, strike: f64, implied_vol: f64) -> f64 {
        greeks::model_delta(&GreeksInput {
            spot: self.spot,
            strike,
            years: self.years,
            rate: self.rate,
            implied_vol,
            dividend_yield: self.dividend_yield,
            option_type,
        })
    }
}

/// Put/call IV ratio at `target_delta` on each wing.
///
/// Returns `None` when either wing has no priced row or the call IV is unusable.
#[must_use]
pub fn vertical_skew(
    chain: &OptionChain,
    ctx: &ChainContext,
    target_delta: f64,
    tail_risk: f64,
    call_bias: f64,
) -> Option<VerticalSkew> {
    let put_iv = wing_iv(chain, ctx, OptionType::Put, -target_delta.abs())?;
    let call_iv = wing_iv(chain, ctx, OptionType::Call, target_delta.abs())?;
    if call_iv <= MIN_USABLE_IV {
        return None;
    }
    let ratio = put_iv / call_iv;
    let state = if ratio >= tail_risk {
        SkewState::TailRisk
    } else if ratio <= call_bias {
        SkewState::CallSkewed
    } else {
        SkewState::Neutral
    };
    Some(VerticalSkew {
        put_iv,
        call_iv,
        ratio,
        state,
    })
}

fn wing_iv(
    chain: &OptionChain,
    ctx: &ChainContext,
    option_type: OptionType,
    target: f64,
) -> Option<f64> {
    chain
        .side(option_type)
        .iter()
        .filter(|row| row.implied_vol > MIN_USABLE_IV)
        .map(|row| (row, ctx.delta(option_type, row.strike, row.implied_vol)))
        .filter(|(_, delta)| *delta != 0.0)
        .min_by(|a, b| (a.1 - target).abs().total_cmp(&(b.1 - target).abs()))
        .map(|(row, _)| row.implied_vol)
}
