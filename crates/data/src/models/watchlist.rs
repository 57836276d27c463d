use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::decimal_column;
use crate::error::StoreResult;

/// A symbol a user wants scanned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub owner_id: i64,
    pub symbol: String,
    pub stock_cost_basis: Decimal,
    /// Whether scan proposals for this symbol go through the sentiment check.
    pub use_sentiment: bool,
}

impl WatchlistEntry {
    pub(crate) fn from_row(row: &SqliteRow) -> StoreResult<Self> {
        Ok(Self {
            owner_id: row.try_get("owner_id")?,
            symbol: row.try_get("symbol")?,
            stock_cost_basis: decimal_column(row, "stock_cost_basis")?,
            use_sentiment: row.try_get("use_sentiment")?,
        })
    }
}
