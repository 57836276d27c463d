//! Market data for the options desk.
//!
//! Defines the provider seam consumed by the signal engine, risk aggregator
//! and paper lifecycle, plus a JSON snapshot provider, a last-known-value
//! cache and slippage-adjusted paper fills.

pub mod cache;
pub mod error;
pub mod paper;
pub mod provider;
pub mod snapshot;
pub mod types;

pub use cache::LastKnownCache;
pub use error::MarketDataError;
pub use paper::{simulate_entry, simulate_exit, PaperFill};
pub use provider::{dividend_yield_or_default, spot_price, MarketDataProvider};
pub use snapshot::{SnapshotMarketData, SymbolSnapshot};
pub use types::{closes, ChainRow, DailyClose, OptionChain, Quote};
