//! Error types for external collaborators.

use thiserror::Error;

/// A notification could not be delivered to one recipient.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("recipient {owner_id} unreachable: {reason}")]
    Unreachable { owner_id: i64, reason: String },
    #[error("transport failure: {0}")]
    Transport(String),
}

/// An external advisory service is degraded.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("timed out after {0}ms")]
    Timeout(u64),
    #[error("malformed response: {0}")]
    Malformed(String),
}
