//! Portfolio risk and paper trading for the options desk.
//!
//! - [`RiskAggregator`] folds a book into one beta-weighted [`RiskSnapshot`]
//! - [`optimize`] caps a candidate's quantity against that snapshot
//! - [`PortfolioReport`] projects a snapshot into text and JSON
//! - [`PaperLifecycleManager`] is the single writer for paper positions
//! - [`DeskService`] runs the scan, lifecycle, report and earnings passes
//!
//! Every rule here is deterministic; external opinions only gate entries.

pub mod aggregator;
pub mod correlation;
pub mod exits;
pub mod flags;
pub mod hedging;
pub mod lifecycle;
pub mod notify;
pub mod optimizer;
pub mod report;
pub mod service;
pub mod stats;
pub mod types;

pub use aggregator::{PositionRisk, RiskAggregator, RiskSnapshot, SkippedPosition};
pub use correlation::{estimate_beta, CorrelatedPair};
pub use exits::ExitRules;
pub use flags::{DeltaState, GammaState, MarginState, RiskFlags, ThetaState};
pub use hedging::{HedgeRequirement, MarketRegime, RegimeAssessment};
pub use lifecycle::{LifecycleEvent, LifecycleReport, PaperLifecycleManager};
pub use notify::{DeliverySummary, LogTransport, Notifier, Outbound};
pub use optimizer::{optimize, simulate_exposure, ExposureProjection, OptimizerDecision};
pub use report::{PortfolioReport, ReportOptions};
pub use service::{DeskService, ScanPassSummary, ServiceParts};
pub use stats::PerformanceStats;
pub use types::{ExitReason, LivePosition};
