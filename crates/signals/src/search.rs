//! Expiry and contract selection.

use chrono::NaiveDate;

use optdesk_core::{ContractCandidate, Strategy};
use optdesk_market_data::OptionChain;

use crate::surface::ChainContext;

/// Nearest expiry whose DTE falls inside `window` (inclusive), in any listing order.
#[must_use]
pub fn select_expiry(
    expirations: &[NaiveDate],
    today: NaiveDate,
    window: (i64, i64),
) -> Option<(NaiveDate, i64)> {
    expirations
        .iter()
        .map(|exp| (*exp, (*exp - today).num_days()))
        .filter(|(_, dte)| (window.0..=window.1).contains(dte))
        .min_by_key(|(_, dte)| *dte)
}

/// Traded contract whose model delta is nearest `target_delta`.
///
/// Rows with no volume or an unusable IV (model delta 0) never qualify.
#[must_use]
pub fn find_contract(
    symbol: &str,
    chain: &OptionChain,
    strategy: Strategy,
    target_delta: f64,
    expiry: NaiveDate,
    dte: i64,
    ctx: &ChainContext,
) -> Option<ContractCandidate> {
    let option_type = strategy.option_type();
    chain
        .side(option_type)
        .iter()
        .filter(|row| row.volume > 0)
        .map(|row| (row, ctx.delta(option_type, row.strike, row.implied_vol)))
        .filter(|(_, delta)| *delta != 0.0)
        .min_by(|a, b| {
            (a.1 - target_delta)
                .abs()
                .total_cmp(&(b.1 - target_delta).abs())
        })
        .map(|(row, delta)| ContractCandidate {
            symbol: symbol.to_uppercase(),
            option_type,
            strike: row.strike,
            expiry,
            dte,
            bid: row.bid,
            ask: row.ask,
            last: row.last,
            implied_vol: row.implied_vol,
            model_delta: delta,
            open_interest: row.open_interest,
            volume: row.volume,
        })
}
