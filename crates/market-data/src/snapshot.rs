//! In-memory market data, loadable from a JSON snapshot file.
//!
//! Backs the CLI when no live vendor adapter is wired in, and serves as the
//! provider in tests. Symbols can be marked unavailable to exercise failure paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MarketDataError;
use crate::provider::MarketDataProvider;
use crate::types::{DailyClose, OptionChain, Quote};

/// Everything known about one symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolSnapshot {
    pub quote: Option<Quote>,
    pub history: Vec<DailyClose>,
    pub chains: BTreeMap<NaiveDate, OptionChain>,
    pub earnings: Option<NaiveDate>,
    pub dividend_yield: f64,
    pub is_etf: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotFile {
    symbols: HashMap<String, SymbolSnapshot>,
}

/// Snapshot-backed [`MarketDataProvider`].
#[derive(Debug, Default)]
pub struct SnapshotMarketData {
    symbols: RwLock<HashMap<String, SymbolSnapshot>>,
    unavailable: RwLock<HashSet<String>>,
}

impl SnapshotMarketData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a snapshot file of the form `{"symbols": {"AAPL": {...}}}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MarketDataError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parses a snapshot from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not match the snapshot layout.
    pub fn from_json(raw: &str) -> Result<Self, MarketDataError> {
        let file: SnapshotFile = serde_json::from_str(raw)?;
        let symbols = file
            .symbols
            .into_iter()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();
        Ok(Self {
            symbols: RwLock::new(symbols),
            unavailable: RwLock::new(HashSet::new()),
        })
    }

    /// Serializes the current state back to snapshot JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, MarketDataError> {
        let file = SnapshotFile {
            symbols: self.symbols.read().clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    pub fn set_quote(&self, symbol: &str, quote: Quote) {
        self.entry(symbol, |s| s.quote = Some(quote));
    }

    /// Sets the last price, keeping the rest of the quote.
    pub fn set_last(&self, symbol: &str, last: f64) {
        self.entry(symbol, |s| {
            let mut quote = s.quote.unwrap_or_default();
            quote.last = last;
            s.quote = Some(quote);
        });
    }

    pub fn set_history(&self, symbol: &str, history: Vec<DailyClose>) {
        self.entry(symbol, |s| s.history = history);
    }

    pub fn set_chain(&self, symbol: &str, expiry: NaiveDate, chain: OptionChain) {
        self.entry(symbol, |s| {
            s.chains.insert(expiry, chain);
        });
    }

    pub fn set_earnings(&self, symbol: &str, date: Option<NaiveDate>) {
        self.entry(symbol, |s| s.earnings = date);
    }

    pub fn set_dividend_yield(&self, symbol: &str, dividend_yield: f64) {
        self.entry(symbol, |s| s.dividend_yield = dividend_yield);
    }

    pub fn set_etf(&self, symbol: &str, is_etf: bool) {
        self.entry(symbol, |s| s.is_etf = is_etf);
    }

    /// Makes every request for `symbol` fail until [`Self::restore`] is called.
    pub fn mark_unavailable(&self, symbol: &str) {
        self.unavailable.write().insert(symbol.to_uppercase());
    }

    pub fn restore(&self, symbol: &str) {
        self.unavailable.write().remove(&symbol.to_uppercase());
    }

    fn entry(&self, symbol: &str, update: impl FnOnce(&mut SymbolSnapshot)) {
        let mut symbols = self.symbols.write();
        update(symbols.entry(symbol.to_uppercase()).or_default());
    }

    fn read<T>(
        &self,
        symbol: &str,
        f: impl FnOnce(&SymbolSnapshot) -> Option<T>,
    ) -> Result<T, MarketDataError> {
        let key = symbol.to_uppercase();
        if self.unavailable.read().contains(&key) {
            return Err(MarketDataError::Unavailable(format!("{key} marked unavailable")));
        }
        let symbols = self.symbols.read();
        symbols
            .get(&key)
            .and_then(f)
            .ok_or_else(|| MarketDataError::not_found(symbol))
    }
}

#[async_trait]
impl MarketDataProvider for SnapshotMarketData {
    async fn quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        self.read(symbol, |s| s.quote)
    }

    async fn historical_series(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<DailyClose>, MarketDataError> {
        let history = self.read(symbol, |s| {
            (!s.history.is_empty()).then(|| s.history.clone())
        })?;
        let Some(latest) = history.last().map(|bar| bar.date) else {
            return Ok(history);
        };
        let start = latest - chrono::Duration::days(i64::from(lookback_days));
        debug!(symbol, lookback_days, "Serving snapshot history");
        Ok(history.into_iter().filter(|bar| bar.date > start).collect())
    }

    async fn expirations(&self, symbol: &str) -> Result<Vec<NaiveDate>, MarketDataError> {
        self.read(symbol, |s| Some(s.chains.keys().copied().collect()))
    }

    async fn option_chain(
        &self,
        symbol: &str,
        expiry: NaiveDate,
    ) -> Result<OptionChain, MarketDataError> {
        self.read(symbol, |s| Some(s.chains.get(&expiry).cloned()))?
            .ok_or_else(|| MarketDataError::NoChain {
                symbol: symbol.to_uppercase(),
                expiry,
            })
    }

    async fn earnings_date(&self, symbol: &str) -> Result<Option<NaiveDate>, MarketDataError> {
        self.read(symbol, |s| Some(s.earnings))
    }

    async fn dividend_yield(&self, symbol: &str) -> Result<f64, MarketDataError> {
        self.read(symbol, |s| Some(s.dividend_yield))
    }

    async fn is_index_or_etf(&self, symbol: &str) -> Result<bool, MarketDataError> {
        self.read(symbol, |s| Some(s.is_etf))
    }
}
