//! Last-known-value fallback for quotes and history.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::warn;

use crate::error::MarketDataError;
use crate::provider::MarketDataProvider;
use crate::types::{DailyClose, OptionChain, Quote};

/// Wraps a provider and serves the last successful quote or history when a fetch fails.
///
/// Chains and calendar data pass through unchanged.
pub struct LastKnownCache {
    inner: Arc<dyn MarketDataProvider>,
    quotes: RwLock<HashMap<String, Quote>>,
    history: RwLock<HashMap<String, Vec<DailyClose>>>,
}

impl LastKnownCache {
    #[must_use]
    pub fn new(inner: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            inner,
            quotes: RwLock::new(HashMap::new()),
            history: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl MarketDataProvider for LastKnownCache {
    async fn quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let key = symbol.to_uppercase();
        match self.inner.quote(symbol).await {
            Ok(quote) => {
                self.quotes.write().insert(key, quote);
                Ok(quote)
            }
            Err(e) => match self.quotes.read().get(&key) {
                Some(cached) => {
                    warn!(symbol, error = %e, "Quote fetch failed, serving last known");
                    Ok(*cached)
                }
                None => Err(e),
            },
        }
    }

    async fn historical_series(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<DailyClose>, MarketDataError> {
        let key = symbol.to_uppercase();
        match self.inner.historical_series(symbol, lookback_days).await {
            Ok(series) => {
                self.history.write().insert(key, series.clone());
                Ok(series)
            }
            Err(e) => match self.history.read().get(&key) {
                Some(cached) => {
                    warn!(symbol, error = %e, "History fetch failed, serving last known");
                    Ok(cached.clone())
                }
                None => Err(e),
            },
        }
    }

    async fn expirations(&self, symbol: &str) -> Result<Vec<NaiveDate>, MarketDataError> {
        self.inner.expirations(symbol).await
    }

    async fn option_chain(
        &self,
        symbol: &str,
        expiry: NaiveDate,
    ) -> Result<OptionChain, MarketDataError> {
        self.inner.option_chain(symbol, expiry).await
    }

    async fn earnings_date(&self, symbol: &str) -> Result<Option<NaiveDate>, MarketDataError> {
        self.inner.earnings_date(symbol).await
    }

    async fn dividend_yield(&self, symbol: &str) -> Result<f64, MarketDataError> {
        self.inner.dividend_yield(symbol).await
    }

    async fn is_index_or_etf(&self, symbol: &str) -> Result<bool, MarketDataError> {
        self.inner.is_index_or_etf(symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotMarketData;

    #[tokio::test]
    async fn serves_last_known_quote_after_failure() {
        let snapshot = Arc::new(SnapshotMarketData::new());
        snapshot.set_last("SPY", 512.0);
        let cache = LastKnownCache::new(snapshot.clone());

        assert!((cache.quote("SPY").await.unwrap().last - 512.0).abs() < 1e-12);

        snapshot.mark_unavailable("SPY");
        assert!((cache.quote("spy").await.unwrap().last - 512.0).abs() < 1e-12);
        assert!(cache.quote("QQQ").await.is_err());
    }
}
