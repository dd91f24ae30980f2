use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlaError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("sla target not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] guardant_store::StoreError),
}

pub type SlaResult<T> = Result<T, SlaError>;
