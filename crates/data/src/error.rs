use thiserror::Error;

/// Persistent store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A schema migration failed for a reason other than an already-applied change.
    /// Fatal: later migrations are not attempted.
    #[error("migration v{version:03} failed: {message}")]
    MigrationConflict { version: i64, message: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("invalid row: {0}")]
    InvalidRow(String),
    /// Rejected before reaching the database.
    #[error("invalid position: {0}")]
    InvalidPosition(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
