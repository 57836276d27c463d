//! Per-owner settings (trading capital).

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::error::{StoreError, StoreResult};

/// Repository for owner settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stored capital for an owner, if set.
    ///
    /// # Errors
    /// Returns an error if the database query fails or the stored value is malformed.
    pub async fn capital(&self, owner_id: i64) -> StoreResult<Option<Decimal>> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT capital FROM user_settings WHERE owner_id = ?1")
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?;

        raw.map(|v| {
            Decimal::from_str(&v)
                .map_err(|e| StoreError::InvalidRow(format!("capital = {v:?}: {e}")))
        })
        .transpose()
    }

    /// Stored capital, or `default` when the owner has none.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn capital_or(&self, owner_id: i64, default: Decimal) -> StoreResult<Decimal> {
        Ok(self.capital(owner_id).await?.unwrap_or(default))
    }

    /// Sets an owner's capital.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn set_capital(&self, owner_id: i64, capital: Decimal) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO user_settings (owner_id, capital) VALUES (?1, ?2)
            ON CONFLICT(owner_id) DO UPDATE SET capital = excluded.capital
            ",
        )
        .bind(owner_id)
        .bind(capital.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn capital_defaults_until_set() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = db.settings();

        assert_eq!(repo.capital(9).await.unwrap(), None);
        assert_eq!(repo.capital_or(9, dec!(50000)).await.unwrap(), dec!(50000));

        repo.set_capital(9, dec!(125000)).await.unwrap();
        repo.set_capital(9, dec!(130000)).await.unwrap();
        assert_eq!(repo.capital(9).await.unwrap(), Some(dec!(130000)));
    }
}
