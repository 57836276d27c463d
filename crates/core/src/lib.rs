//! Core types, configuration, greeks, indicators and sizing for the options desk.

pub mod config;
pub mod config_loader;
pub mod config_watcher;
pub mod error;
pub mod greeks;
pub mod indicators;
pub mod kelly;
pub mod traits;
pub mod types;

pub use config::{
    AppConfig, DatabaseConfig, LifecycleConfig, MarketConfig, RiskConfig, ScanConfig,
    SignalConfig, SizingConfig,
};
pub use config_loader::ConfigLoader;
pub use config_watcher::ConfigWatcher;
pub use error::{DeliveryError, ServiceError};
pub use greeks::{Greeks, GreeksInput};
pub use kelly::{OptionsKellySizer, SizingDecision, SizingReason};
pub use traits::{NotificationTransport, SentimentDecision, SentimentOpinion, SentimentService};
pub use types::{ContractCandidate, OptionType, PremiumSide, Strategy, CONTRACT_MULTIPLIER};
