use clap::{Parser, Subcommand};

mod commands;

use commands::{
    CapitalArgs, DeskContext, GlobalArgs, PositionArgs, ReportArgs, ScanArgs, StatsArgs,
    WatchlistArgs,
};

#[derive(Parser)]
#[command(name = "optdesk")]
#[command(about = "Options advisory and paper-trading desk", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Scan every watched symbol once
    Scan(ScanArgs),
    /// Re-price open paper positions and apply exits and rolls
    Manage,
    /// Portfolio risk report
    Report(ReportArgs),
    /// Paper-trading performance
    Stats(StatsArgs),
    /// Earnings alerts for watched and held symbols
    Earnings,
    /// Maintain an owner's watchlist
    Watchlist(WatchlistArgs),
    /// Maintain an owner's recorded positions
    Position(PositionArgs),
    /// Show or set an owner's capital
    Capital(CapitalArgs),
    /// Run the scheduled desk service
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let ctx = DeskContext::open(&cli.global).await?;

    match cli.command {
        Commands::Migrate => commands::run_migrate(&ctx).await?,
        Commands::Scan(args) => commands::run_scan(&ctx, args).await?,
        Commands::Manage => commands::run_manage(&ctx).await?,
        Commands::Report(args) => commands::run_report(&ctx, args).await?,
        Commands::Stats(args) => commands::run_stats(&ctx, args).await?,
        Commands::Earnings => commands::run_earnings(&ctx).await?,
        Commands::Watchlist(args) => commands::run_watchlist(&ctx, args).await?,
        Commands::Position(args) => commands::run_position(&ctx, args).await?,
        Commands::Capital(args) => commands::run_capital(&ctx, args).await?,
        Commands::Serve => commands::run_serve(ctx).await?,
    }

    Ok(())
}
