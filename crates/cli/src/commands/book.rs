//! Watchlist, recorded positions and capital maintenance.

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use rust_decimal::Decimal;

use optdesk_core::OptionType;
use optdesk_data::NewPosition;

use super::context::DeskContext;

/// Arguments for the watchlist command.
#[derive(Args, Debug, Clone)]
pub struct WatchlistArgs {
    /// Owner whose watchlist to change
    #[arg(long)]
    pub owner: i64,

    #[command(subcommand)]
    pub action: WatchlistAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum WatchlistAction {
    /// Add or update a symbol
    Add {
        symbol: String,
        /// Cost basis of stock held against covered calls
        #[arg(long, default_value = "0")]
        cost_basis: Decimal,
        /// Check proposals with the sentiment service
        #[arg(long)]
        sentiment: bool,
    },
    /// Remove a symbol
    Remove { symbol: String },
    /// List watched symbols
    List,
}

/// Arguments for the position command.
#[derive(Args, Debug, Clone)]
pub struct PositionArgs {
    /// Owner of the positions
    #[arg(long)]
    pub owner: i64,

    #[command(subcommand)]
    pub action: PositionAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PositionAction {
    /// Record an option position
    Add {
        symbol: String,
        /// "call" or "put"
        #[arg(long = "type")]
        option_type: String,
        #[arg(long)]
        strike: Decimal,
        /// Expiry as YYYY-MM-DD
        #[arg(long)]
        expiry: String,
        /// Premium per share paid or received
        #[arg(long)]
        entry: Decimal,
        /// Contracts, negative for sold options
        #[arg(long, allow_hyphen_values = true)]
        quantity: i32,
        /// Cost basis of stock covering a short call
        #[arg(long, default_value = "0")]
        cost_basis: Decimal,
    },
    /// Delete a position by id
    Remove { id: i64 },
    /// List recorded positions
    List,
}

/// Arguments for the capital command.
#[derive(Args, Debug, Clone)]
pub struct CapitalArgs {
    #[arg(long)]
    pub owner: i64,

    /// New capital; omit to show the current value
    pub amount: Option<Decimal>,
}

/// Runs the watchlist command.
///
/// # Errors
/// Returns an error if the database operation fails.
pub async fn run_watchlist(ctx: &DeskContext, args: WatchlistArgs) -> Result<()> {
    let repo = ctx.db.watchlist();
    match args.action {
        WatchlistAction::Add {
            symbol,
            cost_basis,
            sentiment,
        } => {
            let symbol = symbol.to_uppercase();
            repo.upsert(args.owner, &symbol, cost_basis, sentiment).await?;
            println!("Watching {symbol}");
        }
        WatchlistAction::Remove { symbol } => {
            let symbol = symbol.to_uppercase();
            if repo.remove(args.owner, &symbol).await? {
                println!("Removed {symbol}");
            } else {
                println!("{symbol} was not on the watchlist");
            }
        }
        WatchlistAction::List => {
            for entry in repo.list_by_owner(args.owner).await? {
                let sentiment = if entry.use_sentiment { "  sentiment" } else { "" };
                println!("{:<8} basis {:>10}{}", entry.symbol, entry.stock_cost_basis, sentiment);
            }
        }
    }
    Ok(())
}

/// Runs the position command.
///
/// # Errors
/// Returns an error on invalid input or if the database operation fails.
pub async fn run_position(ctx: &DeskContext, args: PositionArgs) -> Result<()> {
    let repo = ctx.db.positions();
    match args.action {
        PositionAction::Add {
            symbol,
            option_type,
            strike,
            expiry,
            entry,
            quantity,
            cost_basis,
        } => {
            let option_type = OptionType::parse(&option_type)
                .ok_or_else(|| anyhow!("option type must be call or put, got {option_type}"))?;
            let expiry = NaiveDate::parse_from_str(&expiry, "%Y-%m-%d")
                .map_err(|e| anyhow!("invalid expiry {expiry}: {e}"))?;
            if strike <= Decimal::ZERO {
                bail!("strike must be positive, got {strike}");
            }
            if quantity == 0 {
                bail!("quantity must be non-zero");
            }
            let id = repo
                .insert(&NewPosition {
                    owner_id: args.owner,
                    symbol: symbol.to_uppercase(),
                    option_type,
                    strike,
                    expiry,
                    entry_price: entry,
                    quantity,
                    stock_cost_basis: cost_basis,
                })
                .await?;
            println!("Recorded position #{id}");
        }
        PositionAction::Remove { id } => {
            if repo.delete(args.owner, id).await? {
                println!("Deleted position #{id}");
            } else {
                println!("No position #{id} for owner {}", args.owner);
            }
        }
        PositionAction::List => {
            for p in repo.list_by_owner(args.owner).await? {
                println!(
                    "#{:<5} {} {}{} {}  x{}  entry {}",
                    p.id, p.symbol, p.strike, p.option_type, p.expiry, p.quantity, p.entry_price
                );
            }
        }
    }
    Ok(())
}

/// Shows or sets an owner's capital.
///
/// # Errors
/// Returns an error if the database operation fails.
pub async fn run_capital(ctx: &DeskContext, args: CapitalArgs) -> Result<()> {
    let repo = ctx.db.settings();
    if let Some(amount) = args.amount {
        if amount <= Decimal::ZERO {
            bail!("capital must be positive");
        }
        repo.set_capital(args.owner, amount).await?;
    }
    let capital = repo.capital_or(args.owner, ctx.config.scan.default_capital).await?;
    println!("Capital for owner {}: ${capital}", args.owner);
    Ok(())
}
