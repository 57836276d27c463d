//! Paper position repository.
//!
//! Status transitions are guarded on `status = 'OPEN'` so a position can be
//! closed or rolled at most once.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::{StoreError, StoreResult};
use crate::models::{NewPaperPosition, PaperPositionRecord, PaperStatus};
use crate::repositories::ensure_positive_strike;

const SELECT_COLUMNS: &str = r"
    SELECT id, owner_id, symbol, option_type, strike, expiry, entry_price, quantity,
           status, opened_at, closed_at, exit_price, realized_pnl, parent_position_id, tags
    FROM paper_positions
";

/// Realized result written when a position leaves OPEN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub exit_price: Decimal,
    pub realized_pnl: Decimal,
    pub closed_at: DateTime<Utc>,
}

/// Repository for paper positions.
#[derive(Debug, Clone)]
pub struct PaperPositionRepository {
    pool: SqlitePool,
}

impl PaperPositionRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts an OPEN paper position and returns its id.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn insert(&self, position: &NewPaperPosition) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;
        let id = insert_open(&mut tx, position).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Gets a paper position by id.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_by_id(&self, id: i64) -> StoreResult<Option<PaperPositionRecord>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(PaperPositionRecord::from_row).transpose()
    }

    /// Queries an owner's paper positions, optionally filtered by status.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn query_by_owner(
        &self,
        owner_id: i64,
        status: Option<PaperStatus>,
    ) -> StoreResult<Vec<PaperPositionRecord>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "{SELECT_COLUMNS} WHERE owner_id = ?1 AND status = ?2 ORDER BY id"
                ))
                .bind(owner_id)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("{SELECT_COLUMNS} WHERE owner_id = ?1 ORDER BY id"))
                    .bind(owner_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(PaperPositionRecord::from_row).collect()
    }

    /// All OPEN paper positions across owners, oldest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_open(&self) -> StoreResult<Vec<PaperPositionRecord>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} WHERE status = 'OPEN' ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(PaperPositionRecord::from_row).collect()
    }

    /// Moves an OPEN position to `status` with its realized result.
    ///
    /// Returns `false` if the position was no longer OPEN.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn close(
        &self,
        id: i64,
        status: PaperStatus,
        settlement: Settlement,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let updated = settle_open(&mut tx, id, status, settlement).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Marks `old_id` ROLLED and opens its replacement atomically.
    ///
    /// Returns the replacement id, or `None` if `old_id` was no longer OPEN
    /// (nothing is written in that case).
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn roll(
        &self,
        old_id: i64,
        settlement: Settlement,
        replacement: &NewPaperPosition,
    ) -> StoreResult<Option<i64>> {
        let mut tx = self.pool.begin().await?;
        if !settle_open(&mut tx, old_id, PaperStatus::Rolled, settlement).await? {
            tx.rollback().await?;
            return Ok(None);
        }
        let new_id = insert_open(&mut tx, replacement).await?;
        tx.commit().await?;
        Ok(Some(new_id))
    }

    /// The roll chain containing `id`, root first.
    ///
    /// # Errors
    /// Returns an error if the database query fails or a parent link is dangling.
    pub async fn chain(&self, id: i64) -> StoreResult<Vec<PaperPositionRecord>> {
        let mut current = self
            .get_by_id(id)
            .await?
            .ok_or(StoreError::NotFound { entity: "paper position", id })?;

        // Walk up to the root.
        let mut ancestors = Vec::new();
        while let Some(parent_id) = current.parent_position_id {
            let parent = self.get_by_id(parent_id).await?.ok_or(StoreError::NotFound {
                entity: "paper position",
                id: parent_id,
            })?;
            ancestors.push(current);
            current = parent;
        }
        let mut chain = vec![current];
        chain.extend(ancestors.into_iter().rev());

        // Walk down from the requested position.
        loop {
            let Some(last) = chain.last() else { break };
            let child = sqlx::query(&format!(
                "{SELECT_COLUMNS} WHERE parent_position_id = ?1 ORDER BY id LIMIT 1"
            ))
            .bind(last.id)
            .fetch_optional(&self.pool)
            .await?;
            match child {
                Some(row) => chain.push(PaperPositionRecord::from_row(&row)?),
                None => break,
            }
        }

        Ok(chain)
    }
}

async fn insert_open(
    tx: &mut Transaction<'_, Sqlite>,
    position: &NewPaperPosition,
) -> StoreResult<i64> {
    ensure_positive_strike(&position.symbol, position.strike)?;
    let tags = serde_json::to_string(&position.tags)
        .map_err(|e| StoreError::InvalidRow(format!("tags: {e}")))?;

    let id = sqlx::query_scalar::<_, i64>(
        r"
        INSERT INTO paper_positions
            (owner_id, symbol, option_type, strike, expiry, entry_price, quantity,
             status, opened_at, parent_position_id, tags)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'OPEN', ?8, ?9, ?10)
        RETURNING id
        ",
    )
    .bind(position.owner_id)
    .bind(position.symbol.to_uppercase())
    .bind(position.option_type.as_str())
    .bind(position.strike.to_string())
    .bind(position.expiry)
    .bind(position.entry_price.to_string())
    .bind(position.quantity)
    .bind(position.opened_at)
    .bind(position.parent_position_id)
    .bind(tags)
    .fetch_one(&mut **tx)
    .await?;

    Ok(id)
}

async fn settle_open(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    status: PaperStatus,
    settlement: Settlement,
) -> StoreResult<bool> {
    let result = sqlx::query(
        r"
        UPDATE paper_positions
        SET status = ?2, exit_price = ?3, realized_pnl = ?4, closed_at = ?5
        WHERE id = ?1 AND status = 'OPEN'
        ",
    )
    .bind(id)
    .bind(status.as_str())
    .bind(settlement.exit_price.to_string())
    .bind(settlement.realized_pnl.to_string())
    .bind(settlement.closed_at)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}
