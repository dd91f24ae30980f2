//! Job processors the composition root registers with the job system
//! (spec §2: "C4 is the execution substrate for long-running or bursty
//! work — cleanup, report generation, notification delivery").
//!
//! The Probe Engine (C3) keeps its own per-service tickers for the
//! request/retry/persist path (spec §4.3) since that gating is per-entity
//! and independent of queue depth; C4 carries the bursty, nest-wide work
//! that benefits from priority queuing instead — SLA roll-ups here.

use async_trait::async_trait;
use guardant_jobs::{ExecutionHandle, Job, JobError, JobProcessor, JobResult};
use guardant_proto::SlaTarget;
use guardant_sla::{compute_measurement, new_measurement_id, MeasurementInput};
use guardant_store::Store;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize)]
struct SlaCalculationPayload {
    nest_id: String,
    sla_target_id: String,
    window_start: chrono::DateTime<chrono::Utc>,
    window_end: chrono::DateTime<chrono::Utc>,
    #[serde(default = "default_interval_secs")]
    expected_interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    60
}

/// `job.type == "sla.calculate"` — loads one target, aggregates its
/// window from stored probe results, and persists the measurement.
pub struct SlaCalculationProcessor {
    store: Arc<dyn Store>,
    sla_targets: Arc<guardant_sla::SlaTargetStore>,
    sla_measurements: Arc<guardant_sla::SlaMeasurementStore>,
}

impl SlaCalculationProcessor {
    pub fn new(
        store: Arc<dyn Store>,
        sla_targets: Arc<guardant_sla::SlaTargetStore>,
        sla_measurements: Arc<guardant_sla::SlaMeasurementStore>,
    ) -> Self {
        Self { store, sla_targets, sla_measurements }
    }
}

#[async_trait]
impl JobProcessor for SlaCalculationProcessor {
    async fn process(&self, job: &Job, _handle: &ExecutionHandle) -> JobResult<Value> {
        let payload: SlaCalculationPayload = serde_json::from_value(job.data.clone())
            .map_err(|e| JobError::processor(format!("invalid input: {e}"), false))?;

        let target: SlaTarget = self
            .sla_targets
            .get(&payload.nest_id, &payload.sla_target_id)
            .await
            .map_err(|e| JobError::processor(e.to_string(), true))?
            .ok_or_else(|| JobError::processor(format!("not found: sla target {}", payload.sla_target_id), false))?;

        let results = guardant_sla::load_results_in_window(
            self.store.as_ref(),
            &payload.nest_id,
            target.service_id.as_deref(),
            payload.window_start,
            payload.window_end,
        )
        .await
        .map_err(|e| JobError::processor(e.to_string(), true))?;

        let measurement = compute_measurement(
            new_measurement_id(),
            payload.nest_id.clone(),
            MeasurementInput {
                target: &target,
                window_start: payload.window_start,
                window_end: payload.window_end,
                results,
                expected_interval: Duration::from_secs(payload.expected_interval_secs),
                scheduled_downtime_minutes: 0,
            },
        );

        self.sla_measurements
            .save(&payload.nest_id, &measurement)
            .await
            .map_err(|e| JobError::processor(e.to_string(), true))?;

        info!(sla_target_id = %payload.sla_target_id, measurement_id = %measurement.id, "sla measurement computed");
        Ok(json!({ "measurementId": measurement.id, "overallCompliance": measurement.overall_compliance }))
    }
}

/// `job.type == "notification.dispatch"` — fans a domain event out to a
/// [`guardant_proto::NotificationSink`] (spec §6: delivery failure never
/// rolls back the originating event, so this processor only logs on error
/// rather than propagating it as job failure).
pub struct NotificationDispatchProcessor {
    sink: Arc<dyn guardant_proto::NotificationSink>,
}

impl NotificationDispatchProcessor {
    pub fn new(sink: Arc<dyn guardant_proto::NotificationSink>) -> Self {
        Self { sink }
    }
}

#[derive(Debug, Deserialize)]
struct NotificationPayload {
    channel: guardant_proto::NotificationChannel,
    payload: Value,
}

#[async_trait]
impl JobProcessor for NotificationDispatchProcessor {
    async fn process(&self, job: &Job, _handle: &ExecutionHandle) -> JobResult<Value> {
        let payload: NotificationPayload = serde_json::from_value(job.data.clone())
            .map_err(|e| JobError::processor(format!("invalid input: {e}"), false))?;
        self.sink.send(payload.channel, payload.payload).await;
        Ok(json!({ "dispatched": true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardant_proto::{MeasurementWindow, MetricTarget, ReportFrequency, ResponseTimeTarget};
    use guardant_store::JsonFileStore;

    #[tokio::test]
    async fn sla_calculation_processor_persists_a_measurement() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(dir.path()));
        let sla_targets = Arc::new(guardant_sla::SlaTargetStore::new(store.clone()));
        let sla_measurements = Arc::new(guardant_sla::SlaMeasurementStore::new(store.clone()));

        let target = sla_targets
            .create(
                "nest-a",
                SlaTarget {
                    id: String::new(),
                    nest_id: String::new(),
                    service_id: None,
                    uptime: MetricTarget { target: 99.0 },
                    response_time: ResponseTimeTarget { target_ms: 500.0, percentile: 95.0 },
                    error_rate: MetricTarget { target: 2.0 },
                    availability: MetricTarget { target: 99.0 },
                    window: MeasurementWindow::Monthly,
                    penalty_table: vec![],
                    credit_table: vec![],
                    reporting_frequency: ReportFrequency::Monthly,
                    stakeholders: vec![],
                    exclude_scheduled_maintenance: false,
                    active: true,
                    version: 1,
                },
            )
            .await
            .unwrap();

        let processor = Arc::new(SlaCalculationProcessor::new(store, sla_targets, sla_measurements.clone()));
        let scheduler = guardant_jobs::Scheduler::new(guardant_jobs::JobSystemConfig::default());
        scheduler.register_processor("sla.calculate", processor).await;
        scheduler.start().await;

        let start = chrono::Utc::now();
        let end = start + chrono::Duration::minutes(5);
        let job = Job::new(
            "sla.calculate",
            guardant_jobs::Priority::Normal,
            json!({
                "nest_id": "nest-a",
                "sla_target_id": target.id,
                "window_start": start,
                "window_end": end,
            }),
        );
        scheduler.submit(job).await.unwrap();

        let mut saved = Vec::new();
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            saved = sla_measurements.for_target("nest-a", &target.id).await.unwrap();
            if !saved.is_empty() {
                break;
            }
        }
        assert_eq!(saved.len(), 1);
        scheduler.shutdown().await;
    }
}
