//! SLA target lifecycle, windowed measurement derivation, and report
//! generation (spec §4.6).
//!
//! `measurement` and `report` are pure functions over domain types; this
//! module wires them to the Tenant Data Store under `SLA_DATA`.

#![forbid(unsafe_code)]

pub mod error;
pub mod measurement;
pub mod report;

pub use error::{SlaError, SlaResult};
pub use measurement::{compute_measurement, MeasurementInput};
pub use report::{classify_trend, generate_report, ReportSummary, SlaReport, TargetPerformance, Trend};

use guardant_proto::{gen_id, DataType, ProbeResult, SlaMeasurement, SlaTarget};
use guardant_store::{Store, StoreExt};
use std::sync::Arc;

const SLA_TARGET_PREFIX: &str = guardant_proto::ids::SLA_TARGET_PREFIX;
const SLA_MEASUREMENT_PREFIX: &str = guardant_proto::ids::SLA_MEASUREMENT_PREFIX;

fn target_key(id: &str) -> String {
    format!("sla-target:{id}")
}

fn measurement_key(id: &str) -> String {
    format!("sla-measurement:{id}")
}

/// CRUD over [`SlaTarget`] rows, keyed `sla-target:{id}` under `SLA_DATA`
/// (spec §4.6 "Target creation").
pub struct SlaTargetStore {
    store: Arc<dyn Store>,
}

impl SlaTargetStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validates and persists a new target, assigning its id.
    pub async fn create(&self, nest_id: &str, mut target: SlaTarget) -> SlaResult<SlaTarget> {
        target.validate().map_err(SlaError::Validation)?;
        if target.id.is_empty() {
            target.id = gen_id(SLA_TARGET_PREFIX);
        }
        target.nest_id = nest_id.to_string();
        self.store
            .put_typed(nest_id, DataType::SlaData.as_str(), &target_key(&target.id), &target)
            .await?;
        Ok(target)
    }

    pub async fn get(&self, nest_id: &str, id: &str) -> SlaResult<Option<SlaTarget>> {
        Ok(self.store.get_typed(nest_id, DataType::SlaData.as_str(), &target_key(id)).await?)
    }

    /// `SLA_DATA` also holds measurement rows under a different key prefix;
    /// values that don't parse as a target (measurements) are skipped.
    pub async fn list(&self, nest_id: &str) -> SlaResult<Vec<SlaTarget>> {
        let raw = self.store.list_by_type(nest_id, DataType::SlaData.as_str()).await?;
        Ok(raw.into_iter().filter_map(|v| serde_json::from_value::<SlaTarget>(v).ok()).collect())
    }

    pub async fn delete(&self, nest_id: &str, id: &str) -> SlaResult<()> {
        self.store.delete(nest_id, DataType::SlaData.as_str(), &target_key(id)).await?;
        Ok(())
    }
}

/// CRUD over computed [`SlaMeasurement`] rows, keyed
/// `sla-measurement:{id}` under `SLA_DATA`.
pub struct SlaMeasurementStore {
    store: Arc<dyn Store>,
}

impl SlaMeasurementStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn save(&self, nest_id: &str, measurement: &SlaMeasurement) -> SlaResult<()> {
        self.store
            .put_typed(nest_id, DataType::SlaData.as_str(), &measurement_key(&measurement.id), measurement)
            .await?;
        Ok(())
    }

    pub async fn get(&self, nest_id: &str, id: &str) -> SlaResult<Option<SlaMeasurement>> {
        Ok(self.store.get_typed(nest_id, DataType::SlaData.as_str(), &measurement_key(id)).await?)
    }

    /// All measurements for one target, ordered by window start.
    pub async fn for_target(&self, nest_id: &str, sla_target_id: &str) -> SlaResult<Vec<SlaMeasurement>> {
        let raw = self.store.list_by_type(nest_id, DataType::SlaData.as_str()).await?;
        let mut mine: Vec<SlaMeasurement> = raw
            .into_iter()
            .filter_map(|v| serde_json::from_value::<SlaMeasurement>(v).ok())
            .filter(|m| m.sla_target_id == sla_target_id)
            .collect();
        mine.sort_by_key(|m| m.window_start);
        Ok(mine)
    }
}

/// Loads the probe history a measurement needs (spec §4.6 step 1): every
/// `MONITORING_DATA` row for the nest, optionally narrowed to one
/// service, within `[start, end]`.
pub async fn load_results_in_window(
    store: &dyn Store,
    nest_id: &str,
    service_id: Option<&str>,
    window_start: chrono::DateTime<chrono::Utc>,
    window_end: chrono::DateTime<chrono::Utc>,
) -> SlaResult<Vec<ProbeResult>> {
    let raw = store.list_by_type(nest_id, DataType::MonitoringData.as_str()).await?;
    let mut results = Vec::new();
    for v in raw {
        let Ok(r) = serde_json::from_value::<ProbeResult>(v) else { continue };
        if let Some(sid) = service_id {
            if r.service_id != sid {
                continue;
            }
        }
        if r.timestamp >= window_start && r.timestamp <= window_end {
            results.push(r);
        }
    }
    Ok(results)
}

/// Generates a fresh measurement id (`meas_...`) for [`compute_measurement`] callers.
pub fn new_measurement_id() -> String {
    gen_id(SLA_MEASUREMENT_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardant_proto::{MeasurementWindow, MetricTarget, ReportFrequency, ResponseTimeTarget};
    use guardant_store::JsonFileStore;

    fn sample_target() -> SlaTarget {
        SlaTarget {
            id: String::new(),
            nest_id: String::new(),
            service_id: Some("svc-1".to_string()),
            uptime: MetricTarget { target: 99.9 },
            response_time: ResponseTimeTarget { target_ms: 500.0, percentile: 95.0 },
            error_rate: MetricTarget { target: 1.0 },
            availability: MetricTarget { target: 99.9 },
            window: MeasurementWindow::Monthly,
            penalty_table: vec![],
            credit_table: vec![],
            reporting_frequency: ReportFrequency::Monthly,
            stakeholders: vec![],
            exclude_scheduled_maintenance: false,
            active: true,
            version: 1,
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_rejects_invalid_target() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(dir.path()));
        let targets = SlaTargetStore::new(store);

        let created = targets.create("nest-a", sample_target()).await.unwrap();
        assert!(created.id.starts_with("sla_"));
        assert_eq!(targets.get("nest-a", &created.id).await.unwrap().unwrap().id, created.id);

        let mut invalid = sample_target();
        invalid.uptime.target = 150.0;
        assert!(targets.create("nest-a", invalid).await.is_err());
    }

    #[tokio::test]
    async fn measurement_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(dir.path()));
        let measurements = SlaMeasurementStore::new(store.clone());

        let target = sample_target();
        let start = chrono::Utc::now();
        let end = start + chrono::Duration::minutes(10);
        let measurement = compute_measurement(
            new_measurement_id(),
            "nest-a".to_string(),
            MeasurementInput {
                target: &target,
                window_start: start,
                window_end: end,
                results: vec![],
                expected_interval: std::time::Duration::from_secs(60),
                scheduled_downtime_minutes: 0,
            },
        );
        measurements.save("nest-a", &measurement).await.unwrap();
        let fetched = measurements.for_target("nest-a", &measurement.sla_target_id).await.unwrap();
        assert_eq!(fetched.len(), 1);
    }
}
