//! Domain types shared across the desk.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Contract multiplier for standard US equity options.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

/// Option right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "call" | "c" => Some(Self::Call),
            "put" | "p" => Some(Self::Put),
            _ => None,
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "C"),
            Self::Put => write!(f, "P"),
        }
    }
}

/// Whether a strategy collects or pays premium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PremiumSide {
    Credit,
    Debit,
}

/// The four single-leg strategies the signal engine can propose.
///
/// Each variant fixes its option right, target model delta, DTE window and
/// position sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    SellPut,
    SellCall,
    BuyCall,
    BuyPut,
}

impl Strategy {
    #[must_use]
    pub fn option_type(self) -> OptionType {
        match self {
            Self::SellPut | Self::BuyPut => OptionType::Put,
            Self::SellCall | Self::BuyCall => OptionType::Call,
        }
    }

    #[must_use]
    pub fn side(self) -> PremiumSide {
        match self {
            Self::SellPut | Self::SellCall => PremiumSide::Credit,
            Self::BuyCall | Self::BuyPut => PremiumSide::Debit,
        }
    }

    #[must_use]
    pub fn is_credit(self) -> bool {
        self.side() == PremiumSide::Credit
    }

    /// Target model delta, signed by option right.
    #[must_use]
    pub fn target_delta(self) -> f64 {
        match self {
            Self::SellPut => -0.20,
            Self::SellCall => 0.20,
            Self::BuyCall => 0.50,
            Self::BuyPut => -0.50,
        }
    }

    /// Inclusive DTE window for the expiry search.
    #[must_use]
    pub fn dte_window(self) -> (i64, i64) {
        match self.side() {
            PremiumSide::Credit => (30, 45),
            PremiumSide::Debit => (30, 60),
        }
    }

    /// -1 for sellers, +1 for buyers.
    #[must_use]
    pub fn direction_sign(self) -> i32 {
        match self.side() {
            PremiumSide::Credit => -1,
            PremiumSide::Debit => 1,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SellPut => "sell_put",
            Self::SellCall => "sell_call",
            Self::BuyCall => "buy_call",
            Self::BuyPut => "buy_put",
        }
    }

    /// Strategy that opens a position of this right and sign.
    #[must_use]
    pub fn for_position(option_type: OptionType, quantity: i32) -> Self {
        match (option_type, quantity < 0) {
            (OptionType::Put, true) => Self::SellPut,
            (OptionType::Call, true) => Self::SellCall,
            (OptionType::Call, false) => Self::BuyCall,
            (OptionType::Put, false) => Self::BuyPut,
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sell_put" | "sto_put" => Some(Self::SellPut),
            "sell_call" | "sto_call" => Some(Self::SellCall),
            "buy_call" | "bto_call" => Some(Self::BuyCall),
            "buy_put" | "bto_put" => Some(Self::BuyPut),
            _ => None,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contract surviving the selection stages of a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractCandidate {
    pub symbol: String,
    pub option_type: OptionType,
    pub strike: f64,
    pub expiry: NaiveDate,
    pub dte: i64,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub implied_vol: f64,
    pub model_delta: f64,
    pub open_interest: u64,
    pub volume: u64,
}

impl ContractCandidate {
    /// Midpoint of the quoted market.
    #[must_use]
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Human-readable contract description (e.g., "NVDA 140C 2026-03-20").
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}{} {}", self.symbol, self.strike, self.option_type, self.expiry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parameters_are_consistent() {
        for s in [Strategy::SellPut, Strategy::SellCall, Strategy::BuyCall, Strategy::BuyPut] {
            let (lo, hi) = s.dte_window();
            assert!(lo < hi);
            let sign_of_delta = s.target_delta().signum();
            match s.option_type() {
                OptionType::Call => assert_eq!(sign_of_delta, 1.0),
                OptionType::Put => assert_eq!(sign_of_delta, -1.0),
            }
            assert_eq!(Strategy::parse(s.as_str()), Some(s));
            assert_eq!(Strategy::for_position(s.option_type(), s.direction_sign()), s);
        }
        assert_eq!(Strategy::SellPut.direction_sign(), -1);
        assert_eq!(Strategy::BuyPut.dte_window(), (30, 60));
    }

    #[test]
    fn option_type_round_trips_through_str() {
        assert_eq!(OptionType::parse("PUT"), Some(OptionType::Put));
        assert_eq!(OptionType::parse(OptionType::Call.as_str()), Some(OptionType::Call));
        assert!(OptionType::parse("straddle").is_none());
    }
}
