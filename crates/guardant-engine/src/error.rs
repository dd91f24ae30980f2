use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("service {0} is not registered")]
    UnknownService(String),

    #[error("store error: {0}")]
    Store(#[from] guardant_store::StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;
