//! Contract-selection signals for the options desk.
//!
//! [`SignalEngine`] turns one symbol into at most one sized trade proposal;
//! [`MarketScanner`] runs it across every watched symbol and routes proposals
//! to owners through the [`CooldownStore`] and [`SentimentGate`].

pub mod cooldown;
pub mod engine;
pub mod gates;
pub mod liquidity;
pub mod scan;
pub mod search;
pub mod sentiment;
pub mod surface;
pub mod technical;

pub use cooldown::CooldownStore;
pub use engine::{RejectReason, SignalEngine, SignalOutcome, TradeProposal};
pub use gates::ExpectedMove;
pub use liquidity::{LiquidityCheck, LiquidityReject, SpreadRule};
pub use scan::{
    group_targets, MarketScanner, ScanAlert, ScanMode, ScanReport, ScanSubscriber, ScanTarget,
};
pub use sentiment::SentimentGate;
pub use surface::{ChainContext, EarningsWindow, SkewState, TermState, TermStructure, VerticalSkew};
pub use technical::{select_strategy, TechnicalSnapshot};
