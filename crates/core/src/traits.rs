use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DeliveryError, ServiceError};
use crate::types::Strategy;

/// Decision returned by the sentiment/risk-opinion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentDecision {
    Approve,
    Veto,
    Skip,
}

impl SentimentDecision {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Veto => "VETO",
            Self::Skip => "SKIP",
        }
    }
}

/// An external opinion on a proposed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentOpinion {
    pub decision: SentimentDecision,
    pub reasoning: String,
    /// Set when the service was unavailable and the default approval was used.
    pub fallback: bool,
}

/// Sentiment/news opinion on a symbol and strategy.
#[async_trait]
pub trait SentimentService: Send + Sync {
    async fn assess(
        &self,
        symbol: &str,
        strategy: Strategy,
        context: &str,
    ) -> Result<SentimentOpinion, ServiceError>;
}

/// Outbound message channel to desk users.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn deliver(
        &self,
        owner_id: i64,
        text: &str,
        report: &serde_json::Value,
    ) -> Result<(), DeliveryError>;
}
