//! One-shot desk passes: migrate, scan, manage, report, stats and earnings.

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use optdesk_data::MIGRATIONS;
use optdesk_options_manager::report::render_performance;
use optdesk_options_manager::ReportOptions;
use optdesk_signals::ScanMode;

use super::context::DeskContext;

/// Arguments for the scan command.
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Bypass cooldowns (alerts still stamp them) and skip paper entries
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the report command.
#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Owner to report on; omit to deliver reports to every owner with positions
    #[arg(long)]
    pub owner: Option<i64>,

    /// Totals and flags only
    #[arg(long)]
    pub summary: bool,

    /// Print the structured report instead of text
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the stats command.
#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    /// Owner whose paper trades to summarize
    #[arg(long)]
    pub owner: i64,
}

/// Applies pending migrations and prints the schema version.
///
/// # Errors
/// Returns an error if a migration conflicts.
pub async fn run_migrate(ctx: &DeskContext) -> Result<()> {
    let report = ctx.db.migrate().await?;
    println!(
        "Schema at version {} of {} migrations",
        report.current_version,
        MIGRATIONS.len()
    );
    Ok(())
}

/// Runs one market scan over every watchlist.
///
/// # Errors
/// Returns an error if the store fails.
pub async fn run_scan(ctx: &DeskContext, args: ScanArgs) -> Result<()> {
    let mode = if args.force {
        ScanMode::Forced
    } else {
        ScanMode::Automatic
    };
    let summary = ctx.service().scan_pass(mode, Utc::now()).await?;
    println!(
        "Alerts {}  rejected {}  failed {}  suppressed {}  paper entries {}  delivered {}/{}",
        summary.alerts,
        summary.rejected,
        summary.failed,
        summary.suppressed,
        summary.entries,
        summary.delivery.delivered,
        summary.delivery.delivered + summary.delivery.failed
    );
    Ok(())
}

/// Runs one paper lifecycle pass.
///
/// # Errors
/// Returns an error if the store fails.
pub async fn run_manage(ctx: &DeskContext) -> Result<()> {
    let report = ctx.service().lifecycle_pass(Utc::now()).await?;
    for event in &report.events {
        println!("{}", event.message());
    }
    for (id, reason) in &report.skipped {
        println!("Paper #{id} skipped: {reason}");
    }
    println!(
        "{} transitioned, {} held, {} skipped",
        report.events.len(),
        report.held,
        report.skipped.len()
    );
    Ok(())
}

/// Prints one owner's report, or delivers reports to everyone.
///
/// # Errors
/// Returns an error if the store fails or the report cannot be serialized.
pub async fn run_report(ctx: &DeskContext, args: ReportArgs) -> Result<()> {
    let service = ctx.service();
    let today = Utc::now().date_naive();
    let Some(owner_id) = args.owner else {
        let delivery = service.report_pass(today).await?;
        println!("Delivered {} reports, {} failed", delivery.delivered, delivery.failed);
        return Ok(());
    };

    let options = if args.summary {
        ReportOptions::summary()
    } else {
        ReportOptions::full()
    };
    let report = service.portfolio_report(owner_id, today).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.to_value(&options))?);
    } else {
        print!("{}", report.render(&options));
    }
    Ok(())
}

/// Prints realized paper-trading performance.
///
/// # Errors
/// Returns an error if the store fails.
pub async fn run_stats(ctx: &DeskContext, args: StatsArgs) -> Result<()> {
    let stats = ctx.service().stats(args.owner).await?;
    print!("{}", render_performance(&stats));
    Ok(())
}

/// Sends earnings alerts for the coming days.
///
/// # Errors
/// Returns an error if the store fails.
pub async fn run_earnings(ctx: &DeskContext) -> Result<()> {
    let delivery = ctx.service().earnings_pass(Utc::now().date_naive()).await?;
    println!("Delivered {} earnings alerts, {} failed", delivery.delivered, delivery.failed);
    Ok(())
}
