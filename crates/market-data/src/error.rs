use chrono::NaiveDate;
use thiserror::Error;

/// Market data could not be obtained.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("no data for {symbol}")]
    NotFound { symbol: String },
    #[error("no option chain for {symbol} {expiry}")]
    NoChain { symbol: String, expiry: NaiveDate },
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot parse: {0}")]
    Parse(#[from] serde_json::Error),
}

impl MarketDataError {
    pub fn not_found(symbol: &str) -> Self {
        Self::NotFound {
            symbol: symbol.to_string(),
        }
    }
}
