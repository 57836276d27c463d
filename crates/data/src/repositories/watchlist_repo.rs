//! Watchlist repository.

use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::error::StoreResult;
use crate::models::WatchlistEntry;

/// Repository for per-owner watchlists.
#[derive(Debug, Clone)]
pub struct WatchlistRepository {
    pool: SqlitePool,
}

impl WatchlistRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Adds or updates a watchlist symbol.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn upsert(
        &self,
        owner_id: i64,
        symbol: &str,
        stock_cost_basis: Decimal,
        use_sentiment: bool,
    ) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO watchlist (owner_id, symbol, stock_cost_basis, use_sentiment)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(owner_id, symbol) DO UPDATE SET
                stock_cost_basis = excluded.stock_cost_basis,
                use_sentiment = excluded.use_sentiment
            ",
        )
        .bind(owner_id)
        .bind(symbol.to_uppercase())
        .bind(stock_cost_basis.to_string())
        .bind(use_sentiment)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Removes a symbol. Returns `false` if it was not watched.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn remove(&self, owner_id: i64, symbol: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM watchlist WHERE owner_id = ?1 AND symbol = ?2")
            .bind(owner_id)
            .bind(symbol.to_uppercase())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Lists an owner's watchlist.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_by_owner(&self, owner_id: i64) -> StoreResult<Vec<WatchlistEntry>> {
        let rows = sqlx::query(
            r"
            SELECT owner_id, symbol, stock_cost_basis, use_sentiment
            FROM watchlist
            WHERE owner_id = ?1
            ORDER BY symbol
            ",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(WatchlistEntry::from_row).collect()
    }

    /// Every watchlist row, grouped by symbol.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_all(&self) -> StoreResult<Vec<WatchlistEntry>> {
        let rows = sqlx::query(
            r"
            SELECT owner_id, symbol, stock_cost_basis, use_sentiment
            FROM watchlist
            ORDER BY symbol, owner_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(WatchlistEntry::from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn upsert_updates_existing_symbol() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = db.watchlist();

        repo.upsert(1, "nvda", dec!(0), true).await.unwrap();
        repo.upsert(1, "NVDA", dec!(120.5), false).await.unwrap();
        repo.upsert(2, "amd", dec!(0), true).await.unwrap();

        let mine = repo.list_by_owner(1).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].stock_cost_basis, dec!(120.5));
        assert!(!mine[0].use_sentiment);

        let all = repo.list_all().await.unwrap();
        assert_eq!(all.iter().map(|e| e.symbol.as_str()).collect::<Vec<_>>(), vec!["AMD", "NVDA"]);
        assert!(repo.remove(1, "nvda").await.unwrap());
        assert!(!repo.remove(1, "nvda").await.unwrap());
    }
}
