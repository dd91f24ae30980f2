//! Error taxonomy for the composition-root binary. Every component error
//! enum (spec §7) folds into this one for the CLI's own reporting; the
//! library components themselves keep their typed errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardantdError {
    #[error(transparent)]
    Config(#[from] guardant_config::ConfigError),

    #[error(transparent)]
    Store(#[from] guardant_store::StoreError),

    #[error(transparent)]
    Engine(#[from] guardant_engine::EngineError),

    #[error(transparent)]
    Failover(#[from] guardant_failover::FailoverError),

    #[error(transparent)]
    Sla(#[from] guardant_sla::SlaError),

    #[error("unknown exec command: {0}")]
    UnknownCommand(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type GuardantdResult<T> = Result<T, GuardantdError>;
