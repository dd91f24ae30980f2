//! The pluggable unit of work a queued [`Job`] invokes, and the handle
//! passed to it so a long-running processor can observe cancellation
//! (spec §4.4: "Cancellation ... unless the processor itself honors a
//! cancellation signal passed through the execution handle").

use crate::error::JobResult;
use crate::job::Job;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

/// Observes the cancellation state of the execution currently running.
#[derive(Clone)]
pub struct ExecutionHandle {
    pub execution_id: String,
    cancel_rx: watch::Receiver<bool>,
}

impl ExecutionHandle {
    pub(crate) fn new(execution_id: String, cancel_rx: watch::Receiver<bool>) -> Self {
        Self { execution_id, cancel_rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Resolves once cancellation is requested; a processor loop can
    /// `tokio::select!` against this alongside its own work.
    pub async fn cancelled(&mut self) {
        let _ = self.cancel_rx.changed().await;
    }
}

/// A registered handler for one `job.type`. Implementations translate
/// their own failures into [`crate::error::JobError::processor`], setting
/// `recoverable` per spec §4.4's non-recoverable message patterns (or let
/// [`crate::backoff::Recoverability`] classify a plain error string).
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: &Job, handle: &ExecutionHandle) -> JobResult<Value>;
}
