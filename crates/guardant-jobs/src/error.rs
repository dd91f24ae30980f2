//! Job system error taxonomy (spec §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("unknown job type: {0}")]
    UnknownType(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job {0} already completed or cancelled")]
    AlreadyTerminal(String),

    #[error("processor error: {message}")]
    Processor { message: String, recoverable: bool },

    #[error("job timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("queue {0} is paused")]
    QueuePaused(String),
}

impl JobError {
    pub fn processor(message: impl Into<String>, recoverable: bool) -> Self {
        Self::Processor {
            message: message.into(),
            recoverable,
        }
    }

    /// Whether this error class should be retried per the job's backoff
    /// policy (spec §4.4: non-recoverable messages short-circuit retries).
    pub fn is_recoverable(&self) -> bool {
        match self {
            JobError::Processor { recoverable, .. } => *recoverable,
            JobError::Timeout(_) => true,
            JobError::UnknownType(_) | JobError::NotFound(_) | JobError::AlreadyTerminal(_) | JobError::QueuePaused(_) => false,
        }
    }
}

pub type JobResult<T> = Result<T, JobError>;
