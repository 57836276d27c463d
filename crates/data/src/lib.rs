//! Persistence for the options desk.
//!
//! This crate provides:
//! - A `SQLite` connection pool with an ordered, idempotent migration runner
//! - Row models for positions, paper positions and watchlists
//! - Repositories for typed database access

pub mod database;
pub mod error;
pub mod migrations;
pub mod models;
pub mod repositories;

pub use database::Database;
pub use error::{StoreError, StoreResult};
pub use migrations::{run_migrations, Migration, MigrationReport, MIGRATIONS};
pub use models::{
    NewPaperPosition, NewPosition, PaperPositionRecord, PaperStatus, PositionRecord,
    WatchlistEntry,
};
pub use repositories::{
    CooldownRepository, PaperPositionRepository, PositionRepository, SettingsRepository,
    Settlement, WatchlistRepository,
};
