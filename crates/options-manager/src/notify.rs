//! Fan-out of messages to owners through a [`NotificationTransport`].

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{info, warn};

use optdesk_core::{DeliveryError, NotificationTransport};

/// One message for one owner.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub owner_id: i64,
    pub text: String,
    pub report: Value,
}

impl Outbound {
    #[must_use]
    pub fn text(owner_id: i64, text: impl Into<String>) -> Self {
        Self {
            owner_id,
            text: text.into(),
            report: Value::Null,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySummary {
    pub delivered: usize,
    pub failed: usize,
}

/// Delivers concurrently; a failing recipient is logged and counted, never raised.
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn NotificationTransport>,
}

impl Notifier {
    #[must_use]
    pub fn new(transport: Arc<dyn NotificationTransport>) -> Self {
        Self { transport }
    }

    pub async fn send(&self, message: &Outbound) -> bool {
        match self
            .transport
            .deliver(message.owner_id, &message.text, &message.report)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(owner_id = message.owner_id, error = %e, "Delivery failed");
                false
            }
        }
    }

    pub async fn send_all(&self, messages: &[Outbound]) -> DeliverySummary {
        let results = join_all(messages.iter().map(|m| self.send(m))).await;
        let delivered = results.iter().filter(|ok| **ok).count();
        DeliverySummary {
            delivered,
            failed: results.len() - delivered,
        }
    }
}

/// Transport that writes every message to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn deliver(
        &self,
        owner_id: i64,
        text: &str,
        _report: &Value,
    ) -> Result<(), DeliveryError> {
        info!(owner_id, "\n{text}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl NotificationTransport for Recording {
        async fn deliver(
            &self,
            owner_id: i64,
            _text: &str,
            _report: &Value,
        ) -> Result<(), DeliveryError> {
            if owner_id == 13 {
                return Err(DeliveryError::Unreachable {
                    owner_id,
                    reason: "blocked".into(),
                });
            }
            self.sent.lock().push(owner_id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_recipient_is_isolated() {
        let transport = Arc::new(Recording::default());
        let notifier = Notifier::new(transport.clone());
        let summary = notifier
            .send_all(&[Outbound::text(1, "a"), Outbound::text(13, "b"), Outbound::text(2, "c")])
            .await;
        assert_eq!(summary, DeliverySummary { delivered: 2, failed: 1 });
        let mut sent = transport.sent.lock().clone();
        sent.sort_unstable();
        assert_eq!(sent, vec![1, 2]);
    }
}
