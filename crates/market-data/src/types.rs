//! Market data types for underlyings and option chains.

use chrono::NaiveDate;
use optdesk_core::OptionType;
use serde::{Deserialize, Serialize};

/// Underlying quote snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quote {
    pub last: f64,
    pub high: f64,
    pub low: f64,
    pub prev_close: f64,
}

/// One daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// Extracts closes from an ordered daily series.
#[must_use]
pub fn closes(series: &[DailyClose]) -> Vec<f64> {
    series.iter().map(|bar| bar.close).collect()
}

/// One strike row of an option chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainRow {
    pub strike: f64,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub implied_vol: f64,
    #[serde(default)]
    pub open_interest: u64,
    #[serde(default)]
    pub volume: u64,
}

impl ChainRow {
    /// Whether both sides of the market are quoted.
    #[must_use]
    pub fn has_two_sided_quote(&self) -> bool {
        self.bid.is_finite() && self.ask.is_finite() && self.bid > 0.0 && self.ask > 0.0
    }

    /// Bid/ask midpoint, or the last trade when the market is one-sided.
    #[must_use]
    pub fn mid_or_last(&self) -> f64 {
        if self.has_two_sided_quote() {
            (self.bid + self.ask) / 2.0
        } else {
            self.last
        }
    }
}

/// Calls and puts for one underlying and expiry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptionChain {
    pub calls: Vec<ChainRow>,
    pub puts: Vec<ChainRow>,
}

impl OptionChain {
    /// Rows for one option right.
    #[must_use]
    pub fn side(&self, option_type: OptionType) -> &[ChainRow] {
        match option_type {
            OptionType::Call => &self.calls,
            OptionType::Put => &self.puts,
        }
    }

    /// Exact strike lookup.
    #[must_use]
    pub fn find(&self, option_type: OptionType, strike: f64) -> Option<&ChainRow> {
        self.side(option_type)
            .iter()
            .find(|row| (row.strike - strike).abs() < 1e-6)
    }

    /// Row whose strike is nearest `price`.
    #[must_use]
    pub fn nearest_strike(&self, option_type: OptionType, price: f64) -> Option<&ChainRow> {
        self.side(option_type).iter().min_by(|a, b| {
            (a.strike - price)
                .abs()
                .total_cmp(&(b.strike - price).abs())
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.puts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(strike: f64, bid: f64, ask: f64, last: f64) -> ChainRow {
        ChainRow {
            strike,
            bid,
            ask,
            last,
            implied_vol: 0.3,
            open_interest: 500,
            volume: 50,
        }
    }

    #[test]
    fn mid_falls_back_to_last_on_one_sided_market() {
        assert!((row(100.0, 2.0, 2.2, 1.9).mid_or_last() - 2.1).abs() < 1e-12);
        assert!((row(100.0, 0.0, 2.2, 1.9).mid_or_last() - 1.9).abs() < 1e-12);
        assert!((row(100.0, f64::NAN, 2.2, 1.9).mid_or_last() - 1.9).abs() < 1e-12);
    }

    #[test]
    fn nearest_strike_picks_closest() {
        let chain = OptionChain {
            calls: vec![
                row(95.0, 6.0, 6.2, 6.1),
                row(100.0, 3.0, 3.2, 3.1),
                row(105.0, 1.0, 1.2, 1.1),
            ],
            puts: vec![],
        };
        assert_eq!(chain.nearest_strike(OptionType::Call, 101.9).unwrap().strike, 100.0);
        assert!(chain.nearest_strike(OptionType::Put, 100.0).is_none());
        assert!(chain.find(OptionType::Call, 105.0).is_some());
    }
}
