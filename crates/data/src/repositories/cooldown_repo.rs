//! Signal cooldown stamps, shared by every process scanning the same store.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::StoreResult;

/// Repository for the last alert time per (owner, symbol).
#[derive(Debug, Clone)]
pub struct CooldownRepository {
    pool: SqlitePool,
}

impl CooldownRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every stamp at or after `since`.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn since(
        &self,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<(i64, String, DateTime<Utc>)>> {
        let rows = sqlx::query_as::<_, (i64, String, DateTime<Utc>)>(
            r"
            SELECT owner_id, symbol, last_alert_at
            FROM signal_cooldowns
            WHERE last_alert_at >= ?1
            ORDER BY owner_id, symbol
            ",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Records an alert. An older stamp never overwrites a newer one.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn stamp(&self, owner_id: i64, symbol: &str, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO signal_cooldowns (owner_id, symbol, last_alert_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(owner_id, symbol) DO UPDATE SET last_alert_at = excluded.last_alert_at
            WHERE excluded.last_alert_at > signal_cooldowns.last_alert_at
            ",
        )
        .bind(owner_id)
        .bind(symbol.to_uppercase())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn stamps_only_move_forward() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = db.cooldowns();
        let nine = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let ten = Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap();

        repo.stamp(1, "nvda", ten).await.unwrap();
        repo.stamp(1, "NVDA", nine).await.unwrap();
        repo.stamp(2, "AMD", nine).await.unwrap();

        let all = repo.since(nine).await.unwrap();
        assert_eq!(all, vec![(1, "NVDA".to_string(), ten), (2, "AMD".to_string(), nine)]);
        assert_eq!(repo.since(ten).await.unwrap().len(), 1);
    }
}
