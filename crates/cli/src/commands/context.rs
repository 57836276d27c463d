//! Shared setup: configuration, database and market data.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use optdesk_core::config_loader::DEFAULT_CONFIG_PATH;
use optdesk_core::{AppConfig, ConfigLoader};
use optdesk_data::Database;
use optdesk_market_data::{LastKnownCache, MarketDataProvider, SnapshotMarketData};
use optdesk_options_manager::{DeskService, LogTransport, ServiceParts};

/// Options every command accepts.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Market data snapshot (JSON) standing in for a live feed
    #[arg(long, global = true, env = "OPTDESK_SNAPSHOT")]
    pub snapshot: Option<String>,
}

/// Everything a command needs, opened once.
pub struct DeskContext {
    pub config: AppConfig,
    pub config_path: String,
    pub db: Database,
    pub provider: Arc<dyn MarketDataProvider>,
}

impl DeskContext {
    /// Loads configuration, connects and migrates the database, and opens market data.
    ///
    /// # Errors
    /// Returns an error if the configuration, database or snapshot cannot be opened.
    pub async fn open(args: &GlobalArgs) -> Result<Self> {
        let config = ConfigLoader::load_from(&args.config)
            .with_context(|| format!("loading config from {}", args.config))?;

        ensure_sqlite_dir(&config.database.url)?;
        let db = Database::connect(&config.database.url, config.database.max_connections)
            .await
            .with_context(|| format!("connecting to {}", config.database.url))?;
        db.migrate().await.context("applying migrations")?;

        let snapshot = match &args.snapshot {
            Some(path) => {
                let snapshot = SnapshotMarketData::from_file(path)
                    .with_context(|| format!("loading market snapshot {path}"))?;
                info!(path = %path, "Market snapshot loaded");
                snapshot
            }
            None => {
                warn!("No market snapshot given, every symbol will be unavailable");
                SnapshotMarketData::new()
            }
        };
        let provider: Arc<dyn MarketDataProvider> =
            Arc::new(LastKnownCache::new(Arc::new(snapshot)));

        Ok(Self {
            config,
            config_path: args.config.clone(),
            db,
            provider,
        })
    }

    /// Collaborators for the desk service, delivering through the log.
    #[must_use]
    pub fn parts(&self) -> ServiceParts {
        ServiceParts::new(
            self.db.clone(),
            Arc::clone(&self.provider),
            Arc::new(LogTransport),
            &self.config,
        )
    }

    #[must_use]
    pub fn service(&self) -> DeskService {
        DeskService::new(&self.parts(), self.config.clone())
    }
}

/// Creates the parent directory of a file-backed `SQLite` URL.
fn ensure_sqlite_dir(url: &str) -> Result<()> {
    let Some(rest) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or(rest);
    if let Some(parent) = Path::new(file).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }
    }
    Ok(())
}
