//! Row models for the desk schema.
//!
//! Money columns are stored as decimal TEXT and mapped to `rust_decimal::Decimal`.

pub mod paper_position;
pub mod position;
pub mod watchlist;

pub use paper_position::{NewPaperPosition, PaperPositionRecord, PaperStatus};
pub use position::{NewPosition, PositionRecord};
pub use watchlist::WatchlistEntry;

use std::str::FromStr;

use optdesk_core::OptionType;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error::{StoreError, StoreResult};

pub(crate) fn decimal_column(row: &SqliteRow, column: &str) -> StoreResult<Decimal> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(raw.trim())
        .map_err(|e| StoreError::InvalidRow(format!("{column} = {raw:?}: {e}")))
}

pub(crate) fn optional_decimal_column(
    row: &SqliteRow,
    column: &str,
) -> StoreResult<Option<Decimal>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|v| {
        Decimal::from_str(v.trim())
            .map_err(|e| StoreError::InvalidRow(format!("{column} = {v:?}: {e}")))
    })
    .transpose()
}

pub(crate) fn option_type_column(row: &SqliteRow, column: &str) -> StoreResult<OptionType> {
    let raw: String = row.try_get(column)?;
    OptionType::parse(&raw)
        .ok_or_else(|| StoreError::InvalidRow(format!("{column} = {raw:?}: unknown option type")))
}
