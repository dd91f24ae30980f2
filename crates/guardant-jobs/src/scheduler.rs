//! The background job system (spec component C4): priority queues,
//! concurrency bounds, retries, scheduled/delayed submission, and graceful
//! shutdown. Grounded on the teacher's rolling batch-push idiom for the
//! "strict priority, oldest-first" drain discipline, generalized from a
//! single fixed-size batch loop to five independently-bounded queues.

use crate::error::{JobError, JobResult};
use crate::job::{ExecutionMetrics, ExecutionStatus, Job, JobExecution, Priority, Schedule};
use crate::processor::{ExecutionHandle, JobProcessor};
use crate::queue::{JobQueue, QueueConfig};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct JobSystemConfig {
    pub queues: HashMap<Priority, QueueConfig>,
    pub dispatch_tick: Duration,
    pub shutdown_grace: Duration,
}

impl Default for JobSystemConfig {
    fn default() -> Self {
        let mut queues = HashMap::new();
        queues.insert(
            Priority::Critical,
            QueueConfig {
                max_concurrency: 10,
                default_timeout: Duration::from_secs(30),
                rate_limit_per_second: None,
            },
        );
        queues.insert(
            Priority::High,
            QueueConfig {
                max_concurrency: 8,
                default_timeout: Duration::from_secs(30),
                rate_limit_per_second: None,
            },
        );
        queues.insert(Priority::Normal, QueueConfig::default());
        queues.insert(
            Priority::Low,
            QueueConfig {
                max_concurrency: 3,
                default_timeout: Duration::from_secs(60),
                rate_limit_per_second: Some(5.0),
            },
        );
        queues.insert(
            Priority::Bulk,
            QueueConfig {
                max_concurrency: 2,
                default_timeout: Duration::from_secs(120),
                rate_limit_per_second: Some(2.0),
            },
        );
        Self {
            queues,
            dispatch_tick: Duration::from_millis(50),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

struct TrackedExecution {
    cancel_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

/// Owns every queue, the processor registry, and in-flight execution
/// bookkeeping. Created by the composition root and shared via `Arc`.
pub struct Scheduler {
    queues: HashMap<Priority, Arc<JobQueue>>,
    processors: RwLock<HashMap<String, Arc<dyn JobProcessor>>>,
    executions: RwLock<HashMap<String, JobExecution>>,
    running: Mutex<HashMap<String, TrackedExecution>>,
    schedule_timers: RwLock<HashMap<String, JoinHandle<()>>>,
    completed_jobs: RwLock<HashSet<String>>,
    config: JobSystemConfig,
    shutdown_tx: watch::Sender<bool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(config: JobSystemConfig) -> Arc<Self> {
        let queues = Priority::ALL
            .into_iter()
            .map(|p| {
                let qc = config.queues.get(&p).cloned().unwrap_or_default();
                (p, Arc::new(JobQueue::new(qc)))
            })
            .collect();
        let (shutdown_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            queues,
            processors: RwLock::new(HashMap::new()),
            executions: RwLock::new(HashMap::new()),
            running: Mutex::new(HashMap::new()),
            schedule_timers: RwLock::new(HashMap::new()),
            completed_jobs: RwLock::new(HashSet::new()),
            config,
            shutdown_tx,
            dispatcher: Mutex::new(None),
        })
    }

    pub async fn register_processor(&self, job_type: impl Into<String>, processor: Arc<dyn JobProcessor>) {
        self.processors.write().await.insert(job_type.into(), processor);
    }

    /// Start the priority-ordered dispatch loop.
    pub async fn start(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.config.dispatch_tick);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.dispatch_tick().await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        *self.dispatcher.lock().await = Some(handle);
    }

    /// Submit a job per spec §4.4's three paths: `schedule` installs a
    /// timer; `delay > 0` enqueues after the delay; otherwise it's
    /// enqueued immediately.
    pub async fn submit(self: &Arc<Self>, job: Job) -> JobResult<String> {
        let id = job.id.clone();

        if let Some(schedule) = job.schedule.clone() {
            self.install_schedule(job, schedule).await;
            return Ok(id);
        }

        if let Some(delay) = job.delay.filter(|d| !d.is_zero()) {
            let scheduler = Arc::clone(self);
            let delayed_job = job;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                scheduler.enqueue(delayed_job);
            });
            return Ok(id);
        }

        self.enqueue(job);
        Ok(id)
    }

    async fn install_schedule(self: &Arc<Self>, job: Job, schedule: Schedule) {
        let mut timers = self.schedule_timers.write().await;
        if let Some(prev) = timers.remove(&job.id) {
            prev.abort();
        }

        let scheduler = Arc::clone(self);
        let job_id = job.id.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let task = match schedule {
            Schedule::Once(after) => {
                let j = job.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = tokio::time::sleep(after) => scheduler.enqueue(j),
                        _ = shutdown_rx.changed() => {}
                    }
                })
            }
            Schedule::Interval(period) => tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await; // first tick fires immediately; skip it
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let mut next = job.clone();
                            next.id = guardant_proto::gen_id("job");
                            scheduler.enqueue(next);
                        }
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() { break; }
                        }
                    }
                }
            }),
            Schedule::Cron(expr) => {
                let schedule = match expr.parse::<cron::Schedule>() {
                    Ok(s) => s,
                    Err(e) => {
                        error!(job_type = %job.job_type, error = %e, "invalid cron expression, schedule not installed");
                        return;
                    }
                };
                tokio::spawn(async move {
                    loop {
                        let Some(next_fire) = schedule.upcoming(chrono::Utc).next() else { break };
                        let wait = (next_fire - Utc::now()).to_std().unwrap_or(Duration::from_secs(1));
                        tokio::select! {
                            _ = tokio::time::sleep(wait) => {
                                let mut next = job.clone();
                                next.id = guardant_proto::gen_id("job");
                                scheduler.enqueue(next);
                            }
                            _ = shutdown_rx.changed() => {
                                if *shutdown_rx.borrow() { break; }
                            }
                        }
                    }
                })
            }
        };
        timers.insert(job_id, task);
    }

    fn enqueue(&self, job: Job) {
        if let Some(queue) = self.queues.get(&job.priority) {
            queue.push_back(job);
        }
    }

    /// One dispatch pass: strictly by priority, oldest-first within a
    /// queue (spec §5). Jobs whose dependencies haven't completed are
    /// deferred to the back of their queue rather than blocking it.
    async fn dispatch_tick(self: &Arc<Self>) {
        for priority in Priority::ALL {
            let Some(queue) = self.queues.get(&priority) else { continue };
            loop {
                let permit = match Arc::clone(&queue.semaphore).try_acquire_owned() {
                    Ok(p) => p,
                    Err(_) => break,
                };
                let Some(job) = queue.try_pop() else {
                    drop(permit);
                    break;
                };

                if !self.dependencies_satisfied(&job).await {
                    queue.requeue_back(job);
                    drop(permit);
                    continue;
                }

                let scheduler = Arc::clone(self);
                tokio::spawn(async move {
                    scheduler.run_job(job, 1).await;
                    drop(permit);
                });
            }
        }
    }

    async fn dependencies_satisfied(&self, job: &Job) -> bool {
        if job.dependencies.is_empty() {
            return true;
        }
        let completed = self.completed_jobs.read().await;
        job.dependencies.iter().all(|d| completed.contains(d))
    }

    async fn run_job(self: &Arc<Self>, job: Job, attempt: u32) {
        let execution = JobExecution::new(&job.id, attempt);
        let execution_id = execution.id.clone();
        self.executions.write().await.insert(execution_id.clone(), execution);

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.running.write().await.insert(
            execution_id.clone(),
            TrackedExecution {
                cancel_tx: cancel_tx.clone(),
                handle: None,
            },
        );

        self.mark_status(&execution_id, ExecutionStatus::Running, None).await;

        let processor = self.processors.read().await.get(&job.job_type).cloned();
        let Some(processor) = processor else {
            self.mark_status(&execution_id, ExecutionStatus::Failed, Some("unknown job type".to_string())).await;
            error!(job_type = %job.job_type, "no processor registered for job type");
            self.running.write().await.remove(&execution_id);
            return;
        };

        let handle = ExecutionHandle::new(execution_id.clone(), cancel_rx);
        let started = std::time::Instant::now();
        let timeout = job.timeout;
        let outcome = tokio::time::timeout(timeout, processor.process(&job, &handle)).await;
        let run_duration = started.elapsed();

        self.running.write().await.remove(&execution_id);

        match outcome {
            Err(_elapsed) => {
                warn!(job_id = %job.id, attempt, ?timeout, "job execution timed out");
                self.finish_or_retry(job, attempt, JobError::Timeout(timeout), run_duration).await;
            }
            Ok(Err(e)) => {
                self.finish_or_retry(job, attempt, e, run_duration).await;
            }
            Ok(Ok(_value)) => {
                self.mark_completed(&execution_id, run_duration).await;
                self.completed_jobs.write().await.insert(job.id.clone());
                debug!(job_id = %job.id, attempt, "job completed");
            }
        }
    }

    async fn finish_or_retry(self: &Arc<Self>, job: Job, attempt: u32, error: JobError, run_duration: Duration) {
        let recoverable = error.is_recoverable();
        let can_retry = recoverable && attempt < job.retry_config.max_attempts;

        if can_retry {
            let delay = job.retry_config.delay_for_attempt(attempt);
            info!(job_id = %job.id, attempt, ?delay, error = %error, "job failed, retrying");
            let scheduler = Arc::clone(self);
            let next_job = job.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                scheduler.run_job(next_job, attempt + 1).await;
            });
        } else {
            error!(job_id = %job.id, attempt, error = %error, recoverable, "job failed permanently");
        }
        let _ = run_duration;
    }

    async fn mark_status(&self, execution_id: &str, status: ExecutionStatus, error: Option<String>) {
        if let Some(exec) = self.executions.write().await.get_mut(execution_id) {
            exec.status = status;
            exec.error = error;
            if status == ExecutionStatus::Running {
                exec.started_at = Some(Utc::now());
            }
        }
    }

    async fn mark_completed(&self, execution_id: &str, run_duration: Duration) {
        if let Some(exec) = self.executions.write().await.get_mut(execution_id) {
            exec.status = ExecutionStatus::Completed;
            exec.completed_at = Some(Utc::now());
            exec.metrics.run_duration = Some(run_duration);
        }
    }

    /// Cancel any pending schedule for `job_id` and mark all of its
    /// non-running executions `cancelled`. A running execution runs to
    /// natural completion unless it observes cancellation through its
    /// [`ExecutionHandle`].
    pub async fn cancel_job(&self, job_id: &str) {
        if let Some(timer) = self.schedule_timers.write().await.remove(job_id) {
            timer.abort();
        }
        for queue in self.queues.values() {
            queue.remove_pending(job_id);
        }
        let mut executions = self.executions.write().await;
        for exec in executions.values_mut().filter(|e| e.job_id == job_id) {
            if exec.status != ExecutionStatus::Running {
                exec.status = ExecutionStatus::Cancelled;
            } else {
                let running = self.running.lock().await;
                if let Some(tracked) = running.get(&exec.id) {
                    let _ = tracked.cancel_tx.send(true);
                }
            }
        }
    }

    pub fn pause_queue(&self, priority: Priority) {
        if let Some(q) = self.queues.get(&priority) {
            q.pause();
        }
    }

    pub fn resume_queue(&self, priority: Priority) {
        if let Some(q) = self.queues.get(&priority) {
            q.resume();
        }
    }

    pub fn queue_len(&self, priority: Priority) -> usize {
        self.queues.get(&priority).map(|q| q.len()).unwrap_or(0)
    }

    pub async fn execution(&self, execution_id: &str) -> Option<JobExecution> {
        self.executions.read().await.get(execution_id).cloned()
    }

    /// Stop the scheduler, cancel all scheduled timers, and wait up to the
    /// configured grace period for in-flight executions to finish.
    pub async fn shutdown(&self) {
        info!("job system shutting down");
        let _ = self.shutdown_tx.send(true);

        if let Some(dispatcher) = self.dispatcher.lock().await.take() {
            dispatcher.abort();
        }

        let timers: Vec<JoinHandle<()>> = self.schedule_timers.write().await.drain().map(|(_, h)| h).collect();
        for t in timers {
            t.abort();
        }

        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace;
        while tokio::time::Instant::now() < deadline {
            if self.running.lock().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if !self.running.lock().await.is_empty() {
            warn!("job system shutdown grace period exceeded, remaining executions will be aborted on drop");
        }
        info!("job system shutdown complete");
    }
}
