//! The Background Job System (spec component C4): priority-queued,
//! concurrency-bounded job processor with exponential/linear/fixed
//! backoff, cron/interval/once scheduling, and graceful shutdown. The
//! composition root submits bursty, nest-wide work here — SLA roll-ups,
//! notification delivery — while the Probe Engine and Failover Controller
//! keep their own per-entity tickers for the gating spec §5 requires.

#![forbid(unsafe_code)]

mod backoff;
mod error;
mod job;
mod processor;
mod queue;
mod scheduler;

pub use backoff::{BackoffKind, Recoverability, RetryConfig};
pub use error::{JobError, JobResult};
pub use job::{ExecutionMetrics, ExecutionStatus, Job, JobExecution, Priority, Schedule};
pub use processor::{ExecutionHandle, JobProcessor};
pub use queue::QueueConfig;
pub use scheduler::{JobSystemConfig, Scheduler};
