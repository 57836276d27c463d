//! Ordered, idempotent schema migrations.
//!
//! Each migration is applied at most once and recorded in `schema_versions`.
//! A migration whose change is already present ("duplicate column",
//! "already exists") is recorded as applied. Any other failure halts the run.

use std::collections::HashSet;

use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::error::{StoreError, StoreResult};

/// A single schema change.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Outcome of a migration run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<i64>,
    /// Versions whose change was already present in the schema.
    pub tolerated: Vec<i64>,
    pub current_version: i64,
}

/// The desk schema, in version order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "positions and watchlist",
        sql: r"
            CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                option_type TEXT NOT NULL,
                strike TEXT NOT NULL,
                expiry TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity <> 0),
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS watchlist (
                owner_id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                PRIMARY KEY (owner_id, symbol)
            );
        ",
    },
    Migration {
        version: 2,
        description: "covered-call cost basis on positions",
        sql: "ALTER TABLE positions ADD COLUMN stock_cost_basis TEXT NOT NULL DEFAULT '0'",
    },
    Migration {
        version: 3,
        description: "cost basis on watchlist",
        sql: "ALTER TABLE watchlist ADD COLUMN stock_cost_basis TEXT NOT NULL DEFAULT '0'",
    },
    Migration {
        version: 4,
        description: "paper positions",
        sql: r"
            CREATE TABLE IF NOT EXISTS paper_positions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                option_type TEXT NOT NULL,
                strike TEXT NOT NULL,
                expiry TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity <> 0),
                status TEXT NOT NULL DEFAULT 'OPEN',
                opened_at TEXT NOT NULL,
                closed_at TEXT,
                exit_price TEXT,
                realized_pnl TEXT,
                parent_position_id INTEGER REFERENCES paper_positions(id),
                tags TEXT NOT NULL DEFAULT '[]'
            );
        ",
    },
    Migration {
        version: 5,
        description: "per-owner settings",
        sql: r"
            CREATE TABLE IF NOT EXISTS user_settings (
                owner_id INTEGER PRIMARY KEY,
                capital TEXT NOT NULL
            );
        ",
    },
    Migration {
        version: 6,
        description: "sentiment opt-out on watchlist",
        sql: "ALTER TABLE watchlist ADD COLUMN use_sentiment INTEGER NOT NULL DEFAULT 1",
    },
    Migration {
        version: 7,
        description: "paper position lookup index",
        sql: "CREATE INDEX idx_paper_positions_owner_status ON paper_positions (owner_id, status)",
    },
    Migration {
        version: 8,
        description: "signal cooldowns",
        sql: r"
            CREATE TABLE IF NOT EXISTS signal_cooldowns (
                owner_id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                last_alert_at TEXT NOT NULL,
                PRIMARY KEY (owner_id, symbol)
            );
        ",
    },
    Migration {
        version: 9,
        description: "positive strikes",
        sql: r"
            CREATE TRIGGER positions_strike_positive
            BEFORE INSERT ON positions
            WHEN CAST(NEW.strike AS REAL) <= 0
            BEGIN
                SELECT RAISE(ABORT, 'strike must be positive');
            END;
            CREATE TRIGGER paper_positions_strike_positive
            BEFORE INSERT ON paper_positions
            WHEN CAST(NEW.strike AS REAL) <= 0
            BEGIN
                SELECT RAISE(ABORT, 'strike must be positive');
            END;
        ",
    },
];

/// Applies every migration in `migrations` that has not been recorded yet.
///
/// # Errors
///
/// Returns [`StoreError::MigrationConflict`] for the first migration that fails
/// with anything other than an already-applied change; later migrations are
/// not attempted.
pub async fn run_migrations(
    pool: &SqlitePool,
    migrations: &[Migration],
) -> StoreResult<MigrationReport> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS schema_versions (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        ",
    )
    .execute(pool)
    .await?;

    let recorded: HashSet<i64> = sqlx::query_scalar::<_, i64>("SELECT version FROM schema_versions")
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();

    let mut ordered: Vec<&Migration> = migrations.iter().collect();
    ordered.sort_by_key(|m| m.version);

    let mut report = MigrationReport::default();

    for migration in ordered {
        if recorded.contains(&migration.version) {
            continue;
        }

        let mut tx = pool.begin().await?;
        match sqlx::raw_sql(migration.sql).execute(&mut *tx).await {
            Ok(_) => {
                record_version(&mut tx, migration).await?;
                tx.commit().await?;
                info!(
                    version = migration.version,
                    description = migration.description,
                    "Migration applied"
                );
                report.applied.push(migration.version);
            }
            Err(e) => {
                tx.rollback().await?;
                let message = e.to_string();
                if is_already_applied(&message) {
                    let mut tx = pool.begin().await?;
                    record_version(&mut tx, migration).await?;
                    tx.commit().await?;
                    warn!(
                        version = migration.version,
                        error = %message,
                        "Migration change already present, recorded as applied"
                    );
                    report.tolerated.push(migration.version);
                } else {
                    error!(
                        version = migration.version,
                        error = %message,
                        "Migration failed, halting"
                    );
                    return Err(StoreError::MigrationConflict {
                        version: migration.version,
                        message,
                    });
                }
            }
        }
    }

    report.current_version =
        sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(version) FROM schema_versions")
            .fetch_one(pool)
            .await?
            .unwrap_or(0);

    Ok(report)
}

async fn record_version(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    migration: &Migration,
) -> StoreResult<()> {
    sqlx::query("INSERT INTO schema_versions (version, description) VALUES (?1, ?2)")
        .bind(migration.version)
        .bind(migration.description)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn is_already_applied(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("duplicate column") || lower.contains("already exists")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn schema(pool: &SqlitePool) -> Vec<(String, String, Option<String>)> {
        sqlx::query_as(
            "SELECT type, name, sql FROM sqlite_master WHERE name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn applying_twice_matches_applying_once() {
        let pool = memory_pool().await;
        let first = run_migrations(&pool, MIGRATIONS).await.unwrap();
        assert_eq!(first.applied, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(first.current_version, 9);
        let after_once = schema(&pool).await;

        let second = run_migrations(&pool, MIGRATIONS).await.unwrap();
        assert!(second.applied.is_empty());
        assert!(second.tolerated.is_empty());
        assert_eq!(second.current_version, 9);
        assert_eq!(schema(&pool).await, after_once);
    }

    #[tokio::test]
    async fn existing_column_is_tolerated() {
        let pool = memory_pool().await;
        sqlx::raw_sql(
            "CREATE TABLE positions (id INTEGER PRIMARY KEY, stock_cost_basis TEXT NOT NULL DEFAULT '0')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let list = [
            Migration {
                version: 1,
                description: "base",
                sql: "CREATE TABLE IF NOT EXISTS positions (id INTEGER PRIMARY KEY)",
            },
            MIGRATIONS[1],
        ];
        let report = run_migrations(&pool, &list).await.unwrap();
        assert_eq!(report.applied, vec![1]);
        assert_eq!(report.tolerated, vec![2]);
        assert_eq!(report.current_version, 2);
    }

    #[tokio::test]
    async fn conflict_halts_later_migrations() {
        let pool = memory_pool().await;
        let list = [
            Migration {
                version: 1,
                description: "ok",
                sql: "CREATE TABLE a (id INTEGER)",
            },
            Migration {
                version: 2,
                description: "broken",
                sql: "ALTER TABLE missing_table ADD COLUMN x INTEGER",
            },
            Migration {
                version: 3,
                description: "never reached",
                sql: "CREATE TABLE c (id INTEGER)",
            },
        ];

        let err = run_migrations(&pool, &list).await.unwrap_err();
        assert!(matches!(err, StoreError::MigrationConflict { version: 2, .. }));

        let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_versions")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(versions, vec![1]);
        let c_exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'c'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(c_exists, 0);
    }

    #[tokio::test]
    async fn migrations_apply_in_version_order() {
        let pool = memory_pool().await;
        let list = [
            Migration {
                version: 2,
                description: "add column",
                sql: "ALTER TABLE t ADD COLUMN b INTEGER",
            },
            Migration {
                version: 1,
                description: "create",
                sql: "CREATE TABLE t (a INTEGER)",
            },
        ];
        let report = run_migrations(&pool, &list).await.unwrap();
        assert_eq!(report.applied, vec![1, 2]);
    }
}
