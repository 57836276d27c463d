use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::StoreResult;
use crate::migrations::{run_migrations, MigrationReport, MIGRATIONS};
use crate::repositories::{
    CooldownRepository, PaperPositionRepository, PositionRepository, SettingsRepository,
    WatchlistRepository,
};

/// `SQLite` store for positions, paper positions, watchlists and settings.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens a connection pool and applies pending migrations.
    ///
    /// # Arguments
    ///
    /// * `database_url` - `SQLite` URL (e.g., `sqlite://optdesk.db?mode=rwc`)
    /// * `max_connections` - Pool size
    ///
    /// # Errors
    ///
    /// Returns error if the connection fails or a migration conflicts.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Creates a migrated in-memory database.
    ///
    /// A single connection keeps every query on the same in-memory database.
    ///
    /// # Errors
    ///
    /// Returns error if the connection or migrations fail.
    pub async fn new_in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::MigrationConflict`] if a migration fails.
    pub async fn migrate(&self) -> StoreResult<MigrationReport> {
        let report = run_migrations(&self.pool, MIGRATIONS).await?;
        info!(
            applied = report.applied.len(),
            tolerated = report.tolerated.len(),
            version = report.current_version,
            "Schema up to date"
        );
        Ok(report)
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[must_use]
    pub fn positions(&self) -> PositionRepository {
        PositionRepository::new(self.pool.clone())
    }

    #[must_use]
    pub fn paper_positions(&self) -> PaperPositionRepository {
        PaperPositionRepository::new(self.pool.clone())
    }

    #[must_use]
    pub fn watchlist(&self) -> WatchlistRepository {
        WatchlistRepository::new(self.pool.clone())
    }

    #[must_use]
    pub fn cooldowns(&self) -> CooldownRepository {
        CooldownRepository::new(self.pool.clone())
    }

    #[must_use]
    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.pool.clone())
    }
}
