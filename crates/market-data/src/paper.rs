//! Paper fill simulation.
//!
//! Fills are the chain midpoint moved against the trader by a fixed slippage:
//! buyers pay more, sellers receive less.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

/// A simulated fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperFill {
    /// Unadjusted reference price.
    pub mid: f64,
    /// Slippage-adjusted price, rounded to 4 decimal places.
    pub price: Decimal,
}

/// Fill for opening `quantity` contracts (negative = sell to open).
#[must_use]
pub fn simulate_entry(mid: f64, quantity: i32, slippage: f64) -> Option<PaperFill> {
    let factor = if quantity > 0 { 1.0 + slippage } else { 1.0 - slippage };
    fill(mid, factor, quantity, "entry")
}

/// Fill for closing a position of `quantity` contracts.
///
/// Closing a long sells (receives less); closing a short buys back (pays more).
#[must_use]
pub fn simulate_exit(mid: f64, quantity: i32, slippage: f64) -> Option<PaperFill> {
    let factor = if quantity > 0 { 1.0 - slippage } else { 1.0 + slippage };
    fill(mid, factor, quantity, "exit")
}

fn fill(mid: f64, factor: f64, quantity: i32, leg: &'static str) -> Option<PaperFill> {
    if !mid.is_finite() || mid <= 0.0 || quantity == 0 {
        return None;
    }
    let price = Decimal::from_f64(mid * factor)?.round_dp(4);
    debug!(leg, mid, %price, quantity, "Paper fill simulated");
    Some(PaperFill { mid, price })
}
