//! Job definitions, priority queues, and execution records (spec §4.4).

use crate::backoff::RetryConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Five fixed priority queues; strict dominance, lower ordinal wins
/// (spec §5: "priority strictly dominates age").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
    Bulk,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
        Priority::Bulk,
    ];
}

/// How a job's first enqueue is driven.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Schedule {
    /// Enqueued once, after `Duration` from submission.
    Once(Duration),
    /// Re-enqueued every `Duration`, re-installed after each fire.
    Interval(Duration),
    /// Re-enqueued on a cron expression, re-installed after each fire.
    Cron(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub priority: Priority,
    pub data: Value,
    /// Enqueue after this many seconds have elapsed (mutually exclusive
    /// with `schedule` in practice, but the contract treats `schedule`
    /// as taking precedence when both are set).
    pub delay: Option<Duration>,
    pub schedule: Option<Schedule>,
    pub retry_config: RetryConfig,
    pub timeout: Duration,
    /// Per-job override of the queue's `maxConcurrency`; `None` defers to
    /// the queue default.
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Job {
    pub fn new(job_type: impl Into<String>, priority: Priority, data: Value) -> Self {
        Self {
            id: guardant_proto::gen_id("job"),
            job_type: job_type.into(),
            priority,
            data,
            delay: None,
            schedule: None,
            retry_config: RetryConfig::default(),
            timeout: Duration::from_secs(30),
            max_concurrency: None,
            dependencies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Retrying,
    Cancelled,
    Paused,
    Scheduled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub queued_for: Option<Duration>,
    pub run_duration: Option<Duration>,
}

/// One run of a job. A job that retries accumulates multiple executions,
/// one per attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: String,
    pub job_id: String,
    pub attempt: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub error: Option<String>,
    pub metrics: ExecutionMetrics,
}

impl JobExecution {
    pub fn new(job_id: &str, attempt: u32) -> Self {
        Self {
            id: guardant_proto::gen_id("jobexec"),
            job_id: job_id.to_string(),
            attempt,
            started_at: None,
            completed_at: None,
            status: ExecutionStatus::Pending,
            error: None,
            metrics: ExecutionMetrics::default(),
        }
    }
}
