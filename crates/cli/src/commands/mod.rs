//! CLI commands for the options desk.

pub mod book;
pub mod context;
pub mod passes;
pub mod serve;

pub use book::{run_capital, run_position, run_watchlist, CapitalArgs, PositionArgs, WatchlistArgs};
pub use context::{DeskContext, GlobalArgs};
pub use passes::{
    run_earnings, run_manage, run_migrate, run_report, run_scan, run_stats, ReportArgs, ScanArgs,
    StatsArgs,
};
pub use serve::run_serve;
