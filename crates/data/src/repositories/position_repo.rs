//! Position repository.
//!
//! CRUD for advisory positions, always scoped by owner.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::StoreResult;
use crate::models::{NewPosition, PositionRecord};
use crate::repositories::ensure_positive_strike;

const SELECT_COLUMNS: &str = r"
    SELECT id, owner_id, symbol, option_type, strike, expiry, entry_price,
           quantity, stock_cost_basis, created_at
    FROM positions
";

/// Repository for portfolio positions.
#[derive(Debug, Clone)]
pub struct PositionRepository {
    pool: SqlitePool,
}

impl PositionRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a position and returns its id.
    ///
    /// # Errors
    /// Returns [`crate::StoreError::InvalidPosition`] for a non-positive strike,
    /// or an error if the database operation fails.
    pub async fn insert(&self, position: &NewPosition) -> StoreResult<i64> {
        ensure_positive_strike(&position.symbol, position.strike)?;
        let id = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO positions
                (owner_id, symbol, option_type, strike, expiry, entry_price,
                 quantity, stock_cost_basis, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
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
        .bind(position.stock_cost_basis.to_string())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Gets one of the owner's positions by id.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get(&self, owner_id: i64, id: i64) -> StoreResult<Option<PositionRecord>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE owner_id = ?1 AND id = ?2"))
            .bind(owner_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(PositionRecord::from_row).transpose()
    }

    /// Lists all positions held by an owner.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_by_owner(&self, owner_id: i64) -> StoreResult<Vec<PositionRecord>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} WHERE owner_id = ?1 ORDER BY id"))
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(PositionRecord::from_row).collect()
    }

    /// Lists every position across owners.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_all(&self) -> StoreResult<Vec<PositionRecord>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY owner_id, id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(PositionRecord::from_row).collect()
    }

    /// Distinct owners with at least one position.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn owners(&self) -> StoreResult<Vec<i64>> {
        let owners = sqlx::query_scalar("SELECT DISTINCT owner_id FROM positions ORDER BY owner_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(owners)
    }

    /// Deletes one of the owner's positions. Returns `false` if nothing matched.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn delete(&self, owner_id: i64, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM positions WHERE owner_id = ?1 AND id = ?2")
            .bind(owner_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::NaiveDate;
    use optdesk_core::OptionType;
    use rust_decimal_macros::dec;

    fn covered_call(owner_id: i64) -> NewPosition {
        NewPosition {
            owner_id,
            symbol: "aapl".to_string(),
            option_type: OptionType::Call,
            strike: dec!(210),
            expiry: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
            entry_price: dec!(3.45),
            quantity: -2,
            stock_cost_basis: dec!(182.10),
        }
    }

    #[tokio::test]
    async fn insert_and_get_scoped_by_owner() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = db.positions();

        let id = repo.insert(&covered_call(7)).await.unwrap();
        let stored = repo.get(7, id).await.unwrap().unwrap();
        assert_eq!(stored.symbol, "AAPL");
        assert_eq!(stored.strike, dec!(210));
        assert_eq!(stored.entry_price, dec!(3.45));
        assert!(stored.is_short());
        assert!(stored.is_covered_call());

        assert!(repo.get(8, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_positive_strike_is_rejected() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = db.positions();

        for strike in [dec!(0), dec!(-5)] {
            let position = NewPosition {
                strike,
                ..covered_call(3)
            };
            let err = repo.insert(&position).await.unwrap_err();
            assert!(matches!(err, crate::StoreError::InvalidPosition(_)));
        }
        assert!(repo.list_by_owner(3).await.unwrap().is_empty());

        // Writers that skip the repository hit the schema trigger.
        let raw = sqlx::query(
            r"
            INSERT INTO positions
                (owner_id, symbol, option_type, strike, expiry, entry_price, quantity)
            VALUES (3, 'AAPL', 'call', '0', '2025-06-20', '1.00', -1)
            ",
        )
        .execute(db.pool())
        .await;
        assert!(raw.is_err());
    }

    #[tokio::test]
    async fn delete_only_touches_owner_rows() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = db.positions();
        let id = repo.insert(&covered_call(1)).await.unwrap();
        repo.insert(&covered_call(2)).await.unwrap();

        assert!(!repo.delete(2, id).await.unwrap());
        assert!(repo.delete(1, id).await.unwrap());
        assert!(repo.list_by_owner(1).await.unwrap().is_empty());
        assert_eq!(repo.owners().await.unwrap(), vec![2]);
    }
}
