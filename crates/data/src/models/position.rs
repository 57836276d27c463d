//! Advisory portfolio positions.

use chrono::{DateTime, NaiveDate, Utc};
use optdesk_core::OptionType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{decimal_column, option_type_column};
use crate::error::StoreResult;

/// A user's recorded option position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub id: i64,
    pub owner_id: i64,
    pub symbol: String,
    pub option_type: OptionType,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub entry_price: Decimal,
    /// Negative for sellers.
    pub quantity: i32,
    /// Positive when the short call is covered by stock.
    pub stock_cost_basis: Decimal,
    pub created_at: DateTime<Utc>,
}

impl PositionRecord {
    #[must_use]
    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    #[must_use]
    pub fn is_covered_call(&self) -> bool {
        self.option_type == OptionType::Call && self.stock_cost_basis > Decimal::ZERO
    }

    pub(crate) fn from_row(row: &SqliteRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            symbol: row.try_get("symbol")?,
            option_type: option_type_column(row, "option_type")?,
            strike: decimal_column(row, "strike")?,
            expiry: row.try_get("expiry")?,
            entry_price: decimal_column(row, "entry_price")?,
            quantity: row.try_get("quantity")?,
            stock_cost_basis: decimal_column(row, "stock_cost_basis")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Fields required to record a new position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPosition {
    pub owner_id: i64,
    pub symbol: String,
    pub option_type: OptionType,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub entry_price: Decimal,
    pub quantity: i32,
    pub stock_cost_basis: Decimal,
}
