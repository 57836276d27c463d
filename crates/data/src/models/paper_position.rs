//! Simulated positions managed by the paper-trading lifecycle.

use chrono::{DateTime, NaiveDate, Utc};
use optdesk_core::OptionType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{decimal_column, option_type_column, optional_decimal_column};
use crate::error::{StoreError, StoreResult};

/// Lifecycle status of a paper position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaperStatus {
    Open,
    Closed,
    Rolled,
}

impl PaperStatus {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Rolled => "ROLLED",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "OPEN" => Some(Self::Open),
            "CLOSED" => Some(Self::Closed),
            "ROLLED" => Some(Self::Rolled),
            _ => None,
        }
    }

    /// Whether the position has a realized result.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// A paper position row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperPositionRecord {
    pub id: i64,
    pub owner_id: i64,
    pub symbol: String,
    pub option_type: OptionType,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    /// Slippage-adjusted fill price per share.
    pub entry_price: Decimal,
    /// Negative for sellers.
    pub quantity: i32,
    pub status: PaperStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_price: Option<Decimal>,
    /// `None` while open, fixed at close or roll.
    pub realized_pnl: Option<Decimal>,
    pub parent_position_id: Option<i64>,
    pub tags: Vec<String>,
}

impl PaperPositionRecord {
    #[must_use]
    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    /// Days until expiration as of `today`.
    #[must_use]
    pub fn days_to_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry - today).num_days()
    }

    pub(crate) fn from_row(row: &SqliteRow) -> StoreResult<Self> {
        let status_raw: String = row.try_get("status")?;
        let status = PaperStatus::parse(&status_raw)
            .ok_or_else(|| StoreError::InvalidRow(format!("status = {status_raw:?}")))?;
        let tags_raw: String = row.try_get("tags")?;
        let tags: Vec<String> = serde_json::from_str(&tags_raw)
            .map_err(|e| StoreError::InvalidRow(format!("tags = {tags_raw:?}: {e}")))?;

        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            symbol: row.try_get("symbol")?,
            option_type: option_type_column(row, "option_type")?,
            strike: decimal_column(row, "strike")?,
            expiry: row.try_get("expiry")?,
            entry_price: decimal_column(row, "entry_price")?,
            quantity: row.try_get("quantity")?,
            status,
            opened_at: row.try_get("opened_at")?,
            closed_at: row.try_get("closed_at")?,
            exit_price: optional_decimal_column(row, "exit_price")?,
            realized_pnl: optional_decimal_column(row, "realized_pnl")?,
            parent_position_id: row.try_get("parent_position_id")?,
            tags,
        })
    }
}

/// Fields required to open a paper position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPaperPosition {
    pub owner_id: i64,
    pub symbol: String,
    pub option_type: OptionType,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub entry_price: Decimal,
    pub quantity: i32,
    pub opened_at: DateTime<Utc>,
    pub parent_position_id: Option<i64>,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [PaperStatus::Open, PaperStatus::Closed, PaperStatus::Rolled] {
            assert_eq!(PaperStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(PaperStatus::parse("rolled"), Some(PaperStatus::Rolled));
        assert!(PaperStatus::parse("EXPIRED").is_none());
        assert!(!PaperStatus::Open.is_terminal());
    }
}
