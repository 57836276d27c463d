//! Database repositories for the desk.
//!
//! Each repository provides typed access to one table.

pub mod cooldown_repo;
pub mod paper_position_repo;
pub mod position_repo;
pub mod settings_repo;
pub mod watchlist_repo;

pub use cooldown_repo::CooldownRepository;
pub use paper_position_repo::{PaperPositionRepository, Settlement};
pub use position_repo::PositionRepository;
pub use settings_repo::SettingsRepository;
pub use watchlist_repo::WatchlistRepository;

use rust_decimal::Decimal;

use crate::error::{StoreError, StoreResult};

/// Options are only meaningful with a positive strike.
pub(crate) fn ensure_positive_strike(symbol: &str, strike: Decimal) -> StoreResult<()> {
    if strike <= Decimal::ZERO {
        return Err(StoreError::InvalidPosition(format!(
            "{symbol} strike must be positive, got {strike}"
        )));
    }
    Ok(())
}
