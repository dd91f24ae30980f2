//! Failover controller error taxonomy (spec §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FailoverError {
    #[error(transparent)]
    Store(#[from] guardant_store::StoreError),

    #[error("rule {0} references an invalid service pattern: {1}")]
    InvalidPattern(String, String),

    #[error("no healthy target endpoint available for source {0}")]
    NoTargetAvailable(String),

    #[error("traffic router rejected the redirect: {0}")]
    Router(String),

    #[error("endpoint not found: {0}")]
    UnknownEndpoint(String),

    #[error("failover event not found: {0}")]
    UnknownEvent(String),
}

pub type FailoverResult<T> = Result<T, FailoverError>;
