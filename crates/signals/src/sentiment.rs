//! Fail-open wrapper around the sentiment service.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use optdesk_core::{SentimentDecision, SentimentOpinion, SentimentService, ServiceError, Strategy};

/// Asks the sentiment service for an opinion, approving by default when it is
/// missing, failing or slow.
#[derive(Clone)]
pub struct SentimentGate {
    service: Option<Arc<dyn SentimentService>>,
    timeout: Duration,
}

impl SentimentGate {
    #[must_use]
    pub fn new(service: Arc<dyn SentimentService>, timeout: Duration) -> Self {
        Self {
            service: Some(service),
            timeout,
        }
    }

    /// Gate with no service; every opinion is a marked fallback approval.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            service: None,
            timeout: Duration::ZERO,
        }
    }

    pub async fn assess(
        &self,
        symbol: &str,
        strategy: Strategy,
        context: &str,
    ) -> SentimentOpinion {
        let Some(service) = &self.service else {
            return fallback("no sentiment service configured");
        };
        let call = service.assess(symbol, strategy, context);
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(
                u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        };
        match result {
            Ok(opinion) => opinion,
            Err(e) => {
                warn!(
                    symbol,
                    strategy = %strategy,
                    error = %e,
                    "Sentiment service degraded, approving by default"
                );
                fallback(&format!("sentiment unavailable: {e}"))
            }
        }
    }
}

fn fallback(reason: &str) -> SentimentOpinion {
    SentimentOpinion {
        decision: SentimentDecision::Approve,
        reasoning: reason.to_string(),
        fallback: true,
    }
}
