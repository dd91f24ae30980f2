//! Per-priority job queue: FIFO storage, a concurrency semaphore, and a
//! token-bucket rate limiter (spec §4.4's per-queue `maxConcurrency`,
//! `defaultTimeout`, `rateLimitPerSecond`).

use crate::job::Job;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_concurrency: usize,
    pub default_timeout: Duration,
    pub rate_limit_per_second: Option<f64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            default_timeout: Duration::from_secs(30),
            rate_limit_per_second: None,
        }
    }
}

/// A simple token bucket: refills continuously at `rate` tokens/sec, burst
/// capped at `rate` (one second of credit).
struct RateLimiter {
    rate: f64,
    tokens: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    fn new(rate: f64) -> Self {
        Self {
            rate,
            tokens: Mutex::new((rate, Instant::now())),
        }
    }

    fn try_acquire(&self) -> bool {
        let mut guard = self.tokens.lock();
        let (tokens, last) = &mut *guard;
        let now = Instant::now();
        let elapsed = now.duration_since(*last).as_secs_f64();
        *tokens = (*tokens + elapsed * self.rate).min(self.rate);
        *last = now;
        if *tokens >= 1.0 {
            *tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// One of the five fixed priority queues. Holds pending jobs FIFO
/// (oldest-first among equal priority, per spec §5) plus the bounds that
/// gate dispatch.
pub struct JobQueue {
    pending: Mutex<VecDeque<Job>>,
    pub semaphore: Arc<Semaphore>,
    pub config: QueueConfig,
    rate_limiter: Option<RateLimiter>,
    paused: AtomicBool,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> Self {
        let rate_limiter = config.rate_limit_per_second.map(RateLimiter::new);
        Self {
            pending: Mutex::new(VecDeque::new()),
            semaphore: Arc::new(Semaphore::new(config.max_concurrency)),
            config,
            rate_limiter,
            paused: AtomicBool::new(false),
        }
    }

    pub fn push_back(&self, job: Job) {
        self.pending.lock().push_back(job);
    }

    /// Move a job to the back, e.g. when its dependencies are unmet yet.
    pub fn requeue_back(&self, job: Job) {
        self.pending.lock().push_back(job);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Pop the oldest pending job if the queue isn't paused and the rate
    /// limiter (when configured) has a token available. Concurrency
    /// gating (`max_concurrency`) is enforced separately via `semaphore`.
    pub fn try_pop(&self) -> Option<Job> {
        if self.paused.load(Ordering::SeqCst) {
            return None;
        }
        if let Some(limiter) = &self.rate_limiter {
            if !limiter.try_acquire() {
                return None;
            }
        }
        self.pending.lock().pop_front()
    }

    /// Remove every pending job matching `job_id`, returning how many were
    /// removed (used by cancellation of not-yet-running executions).
    pub fn remove_pending(&self, job_id: &str) -> usize {
        let mut guard = self.pending.lock();
        let before = guard.len();
        guard.retain(|j| j.id != job_id);
        before - guard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Priority;
    use serde_json::json;

    #[test]
    fn pop_is_fifo() {
        let q = JobQueue::new(QueueConfig::default());
        q.push_back(Job::new("a", Priority::Normal, json!({})));
        q.push_back(Job::new("b", Priority::Normal, json!({})));
        let first = q.try_pop().unwrap();
        assert_eq!(first.job_type, "a");
        let second = q.try_pop().unwrap();
        assert_eq!(second.job_type, "b");
    }

    #[test]
    fn paused_queue_yields_nothing() {
        let q = JobQueue::new(QueueConfig::default());
        q.push_back(Job::new("a", Priority::Normal, json!({})));
        q.pause();
        assert!(q.try_pop().is_none());
        q.resume();
        assert!(q.try_pop().is_some());
    }

    #[test]
    fn rate_limiter_blocks_beyond_budget() {
        let cfg = QueueConfig {
            rate_limit_per_second: Some(1.0),
            ..QueueConfig::default()
        };
        let q = JobQueue::new(cfg);
        for _ in 0..5 {
            q.push_back(Job::new("a", Priority::Normal, json!({})));
        }
        assert!(q.try_pop().is_some());
        // Burst capacity is one second's worth; a second immediate pop
        // should be rate-limited away.
        assert!(q.try_pop().is_none());
    }

    #[test]
    fn remove_pending_drops_matching_job() {
        let q = JobQueue::new(QueueConfig::default());
        let job = Job::new("a", Priority::Normal, json!({}));
        let id = job.id.clone();
        q.push_back(job);
        assert_eq!(q.remove_pending(&id), 1);
        assert!(q.is_empty());
    }
}
