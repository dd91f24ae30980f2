//! Structured observability for the GuardAnt monitoring core.
//!
//! Provides:
//! - [`OperationsMetrics`] — atomic counters for probes, jobs, failovers, and SLA
//! - [`MetricsExporter`] — Prometheus text format export
//! - [`AuditLogger`] — structured JSON logging of domain operations

#![forbid(unsafe_code)]

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────
// Atomic Counter
// ─────────────────────────────────────────────────────────────

/// A thread-safe u64 counter backed by an atomic.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Increment the counter by one.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the current counter value.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

// ─────────────────────────────────────────────────────────────
// Operations Metrics
// ─────────────────────────────────────────────────────────────

/// Atomic operation counters for the core's key operations (probes, jobs,
/// failover, SLA). All counters are thread-safe and can be shared via
/// [`Arc`].
///
/// # Example
/// ```rust
/// # use guardant_observe::OperationsMetrics;
/// # use std::sync::Arc;
/// let metrics = Arc::new(OperationsMetrics::new());
/// metrics.probes_executed_total.inc();
/// assert_eq!(metrics.probes_executed_total.get(), 1);
/// ```
#[derive(Debug, Default)]
pub struct OperationsMetrics {
    /// Total probe check attempts (all statuses).
    pub probes_executed_total: Counter,
    /// Total probe checks resolving `down`.
    pub probe_failures_total: Counter,
    /// Total job executions dispatched across all queues.
    pub jobs_processed_total: Counter,
    /// Total job executions that exhausted retries or failed terminally.
    pub jobs_failed_total: Counter,
    /// Total failover sequences triggered.
    pub failovers_triggered_total: Counter,
    /// Total failovers that reached `recovered`.
    pub failovers_recovered_total: Counter,
    /// Total SLA measurements computed.
    pub sla_measurements_computed_total: Counter,
    /// Total SLA reports generated.
    pub sla_reports_generated_total: Counter,
    /// Total Tenant Data Store writes.
    pub store_writes_total: Counter,
    /// Total Tenant Data Store errors.
    pub store_errors_total: Counter,
}

impl OperationsMetrics {
    /// Create a new zeroed metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a probe check attempt. Call once per attempt, regardless of outcome.
    pub fn record_probe_executed(&self) {
        self.probes_executed_total.inc();
    }

    /// Record a probe check that resolved `down`.
    pub fn record_probe_failure(&self) {
        self.probe_failures_total.inc();
        warn!(
            counter = "probe_failures_total",
            value = self.probe_failures_total.get(),
            "probe check failed"
        );
    }

    /// Record a dispatched job execution.
    pub fn record_job_processed(&self) {
        self.jobs_processed_total.inc();
    }

    /// Record a job execution that failed terminally.
    pub fn record_job_failed(&self) {
        self.jobs_failed_total.inc();
        warn!(
            counter = "jobs_failed_total",
            value = self.jobs_failed_total.get(),
            "job execution failed"
        );
    }

    /// Record a failover trigger.
    pub fn record_failover_triggered(&self) {
        self.failovers_triggered_total.inc();
        info!(
            counter = "failovers_triggered_total",
            value = self.failovers_triggered_total.get(),
            "failover triggered"
        );
    }

    /// Record a failover reaching `recovered`.
    pub fn record_failover_recovered(&self) {
        self.failovers_recovered_total.inc();
        info!(
            counter = "failovers_recovered_total",
            value = self.failovers_recovered_total.get(),
            "failover recovered"
        );
    }

    /// Record a computed SLA measurement.
    pub fn record_sla_measurement(&self) {
        self.sla_measurements_computed_total.inc();
    }

    /// Record a generated SLA report.
    pub fn record_sla_report(&self) {
        self.sla_reports_generated_total.inc();
    }

    /// Record a Tenant Data Store write.
    pub fn record_store_write(&self) {
        self.store_writes_total.inc();
    }

    /// Record a Tenant Data Store error.
    pub fn record_store_error(&self) {
        self.store_errors_total.inc();
        error!(
            counter = "store_errors_total",
            value = self.store_errors_total.get(),
            "store operation failed"
        );
    }
}

// ─────────────────────────────────────────────────────────────
// Metrics Exporter (Prometheus text format)
// ─────────────────────────────────────────────────────────────

/// Exports [`OperationsMetrics`] in Prometheus text format.
pub struct MetricsExporter {
    metrics: Arc<OperationsMetrics>,
    /// Label prefix added to all metric names (default: `guardant`).
    prefix: String,
}

impl MetricsExporter {
    /// Create a new exporter wrapping the given metrics.
    pub fn new(metrics: Arc<OperationsMetrics>) -> Self {
        Self { metrics, prefix: "guardant".to_string() }
    }

    /// Create with a custom metric name prefix.
    pub fn with_prefix(metrics: Arc<OperationsMetrics>, prefix: impl Into<String>) -> Self {
        Self { metrics, prefix: prefix.into() }
    }

    /// Render all metrics as a Prometheus text format string.
    ///
    /// Each metric is rendered with `# HELP`, `# TYPE`, and value lines.
    pub fn render(&self) -> String {
        let m = &self.metrics;
        let p = &self.prefix;
        let mut out = String::new();

        self.write_counter(&mut out, p, "probes_executed_total", "Total probe check attempts", m.probes_executed_total.get());
        self.write_counter(&mut out, p, "probe_failures_total", "Total probe checks resolving down", m.probe_failures_total.get());
        self.write_counter(&mut out, p, "jobs_processed_total", "Total job executions dispatched", m.jobs_processed_total.get());
        self.write_counter(&mut out, p, "jobs_failed_total", "Total job executions that failed terminally", m.jobs_failed_total.get());
        self.write_counter(&mut out, p, "failovers_triggered_total", "Total failover sequences triggered", m.failovers_triggered_total.get());
        self.write_counter(&mut out, p, "failovers_recovered_total", "Total failovers that reached recovered", m.failovers_recovered_total.get());
        self.write_counter(&mut out, p, "sla_measurements_computed_total", "Total SLA measurements computed", m.sla_measurements_computed_total.get());
        self.write_counter(&mut out, p, "sla_reports_generated_total", "Total SLA reports generated", m.sla_reports_generated_total.get());
        self.write_counter(&mut out, p, "store_writes_total", "Total Tenant Data Store writes", m.store_writes_total.get());
        self.write_counter(&mut out, p, "store_errors_total", "Total Tenant Data Store errors", m.store_errors_total.get());

        out
    }

    fn write_counter(&self, out: &mut String, prefix: &str, name: &str, help: &str, value: u64) {
        out.push_str(&format!("# HELP {prefix}_{name} {help}\n"));
        out.push_str(&format!("# TYPE {prefix}_{name} counter\n"));
        out.push_str(&format!("{prefix}_{name} {value}\n\n"));
    }
}

// ─────────────────────────────────────────────────────────────
// Audit Logger
// ─────────────────────────────────────────────────────────────

/// Category of domain operation being logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// A single probe check attempt.
    ProbeCheck,
    /// A background job execution.
    JobExecution,
    /// A failover sequence (trigger through recovery).
    Failover,
    /// SLA measurement or report computation.
    SlaMeasurement,
    /// Service registration or configuration change.
    ServiceRegistration,
    /// Operator action (manual override).
    OperatorAction,
}

/// Outcome of a logged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    /// Completed successfully.
    Success,
    /// Failed with an error.
    Failure,
    /// Blocked by a safety constraint (e.g. re-entrancy guard, concurrency cap).
    BlockedBySafety,
    /// Requires operator confirmation.
    PendingConfirmation,
}

/// A single structured audit log entry for a domain operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID.
    pub id: String,
    /// Timestamp when the operation occurred.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Agent or system that initiated the operation.
    pub actor: String,
    /// Operation category.
    pub kind: OperationKind,
    /// Target resource (service id, endpoint id, job id, etc.).
    pub resource_id: Option<String>,
    /// Operation outcome.
    pub outcome: OperationOutcome,
    /// Duration of the operation in milliseconds.
    pub duration_ms: Option<u64>,
    /// Additional structured details (nest id, rule id, strategy, etc.).
    pub details: HashMap<String, String>,
}

/// Structured JSON audit logger for domain operations.
///
/// Maintains an in-memory log with thread-safe access. Emits structured
/// tracing events for each logged entry.
pub struct AuditLogger {
    entries: RwLock<Vec<AuditEntry>>,
    /// Maximum number of entries to retain in memory.
    max_entries: usize,
}

impl AuditLogger {
    /// Create a new audit logger retaining up to `max_entries` in memory.
    pub fn new(max_entries: usize) -> Self {
        Self { entries: RwLock::new(Vec::new()), max_entries }
    }

    /// Create with default capacity (10,000 entries).
    pub fn default_capacity() -> Self {
        Self::new(10_000)
    }

    /// Log a domain operation.
    pub fn log(
        &self,
        actor: impl Into<String>,
        kind: OperationKind,
        resource_id: Option<&str>,
        outcome: OperationOutcome,
        duration_ms: Option<u64>,
        details: HashMap<String, String>,
    ) {
        let entry = AuditEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            actor: actor.into(),
            kind,
            resource_id: resource_id.map(String::from),
            outcome,
            duration_ms,
            details,
        };

        let details_json = serde_json::to_string(&entry.details).unwrap_or_default();
        match outcome {
            OperationOutcome::Success => {
                info!(
                    audit_id = %entry.id, actor = %entry.actor, kind = ?entry.kind,
                    resource_id = ?entry.resource_id, duration_ms = ?entry.duration_ms,
                    details = %details_json, "operation succeeded"
                );
            }
            OperationOutcome::Failure => {
                error!(
                    audit_id = %entry.id, actor = %entry.actor, kind = ?entry.kind,
                    resource_id = ?entry.resource_id, details = %details_json, "operation failed"
                );
            }
            OperationOutcome::BlockedBySafety => {
                warn!(
                    audit_id = %entry.id, actor = %entry.actor, kind = ?entry.kind,
                    resource_id = ?entry.resource_id, details = %details_json,
                    "operation blocked by safety constraint"
                );
            }
            OperationOutcome::PendingConfirmation => {
                info!(
                    audit_id = %entry.id, actor = %entry.actor, kind = ?entry.kind,
                    resource_id = ?entry.resource_id, details = %details_json,
                    "operation pending operator confirmation"
                );
            }
        }

        let mut entries = self.entries.write();
        entries.push(entry);
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(0..excess);
        }
    }

    /// Query entries filtered by kind and/or actor.
    pub fn query(&self, kind: Option<OperationKind>, actor: Option<&str>, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read();
        entries
            .iter()
            .filter(|e| kind.is_none_or(|k| e.kind == k))
            .filter(|e| actor.is_none_or(|a| e.actor == a))
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Return all entries as a JSON array string.
    pub fn to_json(&self) -> String {
        let entries = self.entries.read();
        serde_json::to_string_pretty(&*entries).unwrap_or_else(|_| "[]".to_string())
    }

    /// Total number of entries logged.
    pub fn count(&self) -> usize {
        self.entries.read().len()
    }
}

// ─────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────
