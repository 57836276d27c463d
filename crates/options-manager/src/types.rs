//! Types shared by the risk and lifecycle halves of the manager.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use optdesk_core::OptionType;
use optdesk_data::{PaperPositionRecord, PositionRecord};

/// A live option position in analytics units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePosition {
    /// Store id of the position, when it has one.
    pub id: Option<i64>,
    pub symbol: String,
    pub option_type: OptionType,
    pub strike: f64,
    pub expiry: NaiveDate,
    pub entry_price: f64,
    /// Negative for sellers.
    pub quantity: i32,
    pub stock_cost_basis: f64,
}

impl LivePosition {
    #[must_use]
    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    #[must_use]
    pub fn is_covered_call(&self) -> bool {
        self.option_type == OptionType::Call && self.stock_cost_basis > 0.0
    }

    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}{} {}", self.symbol, self.strike, self.option_type, self.expiry)
    }
}

impl From<&PositionRecord> for LivePosition {
    fn from(p: &PositionRecord) -> Self {
        Self {
            id: Some(p.id),
            symbol: p.symbol.clone(),
            option_type: p.option_type,
            strike: p.strike.to_f64().unwrap_or_default(),
            expiry: p.expiry,
            entry_price: p.entry_price.to_f64().unwrap_or_default(),
            quantity: p.quantity,
            stock_cost_basis: p.stock_cost_basis.to_f64().unwrap_or_default(),
        }
    }
}

impl From<&PaperPositionRecord> for LivePosition {
    fn from(p: &PaperPositionRecord) -> Self {
        Self {
            id: Some(p.id),
            symbol: p.symbol.clone(),
            option_type: p.option_type,
            strike: p.strike.to_f64().unwrap_or_default(),
            expiry: p.expiry,
            entry_price: p.entry_price.to_f64().unwrap_or_default(),
            quantity: p.quantity,
            stock_cost_basis: 0.0,
        }
    }
}

/// Why a position should leave the book, or be rolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    ProfitTarget,
    StopLoss,
    /// Short delta expanded past the roll threshold.
    Roll,
    /// DTE at or inside the exit window.
    TimeExit,
    /// Roll triggered but no replacement contract could be found.
    RollUnavailable,
}

impl ExitReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProfitTarget => "profit_target",
            Self::StopLoss => "stop_loss",
            Self::Roll => "roll",
            Self::TimeExit => "time_exit",
            Self::RollUnavailable => "roll_unavailable",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn converts_store_record() {
        let record = PositionRecord {
            id: 4,
            owner_id: 9,
            symbol: "AAPL".into(),
            option_type: OptionType::Call,
            strike: dec!(200.5),
            expiry: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
            entry_price: dec!(3.25),
            quantity: -2,
            stock_cost_basis: dec!(180),
            created_at: Utc::now(),
        };
        let live = LivePosition::from(&record);
        assert_eq!(live.id, Some(4));
        assert!((live.strike - 200.5).abs() < 1e-12);
        assert!(live.is_short());
        assert!(live.is_covered_call());
        assert_eq!(ExitReason::TimeExit.to_string(), "time_exit");
    }
}
