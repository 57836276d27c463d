//! The market data seam.

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::warn;

use crate::error::MarketDataError;
use crate::types::{DailyClose, OptionChain, Quote};

/// Source of underlying quotes, price history, option chains and calendar data.
///
/// Implementations fail per symbol; callers decide whether to skip or fall back.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;

    /// Daily closes, oldest first, covering roughly `lookback_days` calendar days.
    async fn historical_series(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<DailyClose>, MarketDataError>;

    /// Listed expiries. Selection helpers do not depend on their order.
    async fn expirations(&self, symbol: &str) -> Result<Vec<NaiveDate>, MarketDataError>;

    async fn option_chain(
        &self,
        symbol: &str,
        expiry: NaiveDate,
    ) -> Result<OptionChain, MarketDataError>;

    /// Next scheduled earnings date, if known.
    async fn earnings_date(&self, symbol: &str) -> Result<Option<NaiveDate>, MarketDataError>;

    async fn dividend_yield(&self, symbol: &str) -> Result<f64, MarketDataError>;

    async fn is_index_or_etf(&self, symbol: &str) -> Result<bool, MarketDataError>;
}

/// Continuous dividend yield for Greeks, never failing.
///
/// Index products without a quoted yield use `etf_default`; lookup failures use 0.
pub async fn dividend_yield_or_default(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    etf_default: f64,
) -> f64 {
    let quoted = provider.dividend_yield(symbol).await.unwrap_or(0.0);
    if quoted > 0.0 {
        return quoted;
    }
    match provider.is_index_or_etf(symbol).await {
        Ok(true) => etf_default,
        _ => 0.0,
    }
}

/// Last price from the quote, falling back to the latest close.
///
/// # Errors
///
/// Returns the quote error when no history is available either.
pub async fn spot_price(
    provider: &dyn MarketDataProvider,
    symbol: &str,
) -> Result<f64, MarketDataError> {
    match provider.quote(symbol).await {
        Ok(quote) if quote.last > 0.0 => Ok(quote.last),
        Ok(_) => latest_close(provider, symbol)
            .await?
            .ok_or_else(|| MarketDataError::not_found(symbol)),
        Err(e) => match latest_close(provider, symbol).await {
            Ok(Some(close)) => {
                warn!(symbol, error = %e, close, "Quote unavailable, using latest close");
                Ok(close)
            }
            _ => Err(e),
        },
    }
}

async fn latest_close(
    provider: &dyn MarketDataProvider,
    symbol: &str,
) -> Result<Option<f64>, MarketDataError> {
    let history = provider.historical_series(symbol, 10).await?;
    Ok(history.last().map(|bar| bar.close).filter(|c| *c > 0.0))
}
