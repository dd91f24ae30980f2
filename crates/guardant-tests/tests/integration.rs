//! End-to-end scenarios spanning the probe engine, failover controller,
//! and SLA manager against a shared store, mirroring the walkthroughs a
//! GuardAnt operator would actually run through once.

use async_trait::async_trait;
use chrono::Utc;
use guardant_engine::{EngineConfig, ProbeEngine};
use guardant_failover::{FailoverConfig, FailoverController};
use guardant_observe::OperationsMetrics;
use guardant_probes::{Probe, ProbeOutcome, ProbeRegistry};
use guardant_proto::{
    ComparisonOp, DataType, EndpointStatus, FailoverStrategy, FailoverStrategyKind, NestService,
    NullTrafficRouter, ProbeResult, ProbeStatus, RecoveryKind, RecoveryStrategy, ServiceEndpoint,
    ServiceType, ServiceTypeConfig, TargetSelectionStrategy, TrafficRouter, TriggerCondition,
};
use guardant_sla::{compute_measurement, MeasurementInput};
use guardant_store::{JsonFileStore, Store, StoreExt};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn sample_service(id: &str, nest_id: &str, service_type: ServiceType, target: &str) -> NestService {
    let now = Utc::now();
    NestService {
        id: id.to_string(),
        nest_id: nest_id.to_string(),
        name: format!("{id}-service"),
        order: None,
        tags: vec![],
        alerting_enabled: true,
        service_type,
        target: target.to_string(),
        interval: 60,
        config: ServiceTypeConfig::default(),
        last_status: ProbeStatus::Unknown,
        last_check: None,
        message: None,
        response_time: None,
        retry_count: 0,
        created_at: now,
        updated_at: now,
    }
}

struct AlwaysUp;

#[async_trait]
impl Probe for AlwaysUp {
    async fn check(&self, _target: &str, _config: &ServiceTypeConfig, _deadline: Duration) -> ProbeOutcome {
        ProbeOutcome::up("OK (status 200)", Some(12))
    }
}

/// Stands in for a HEAD->GET fallback: the probe engine never sees the
/// HTTP layer, only the outcome a real 405-then-200 round trip produces.
struct FailsOnceThenUp {
    failures_left: AtomicU32,
}

#[async_trait]
impl Probe for FailsOnceThenUp {
    async fn check(&self, _target: &str, _config: &ServiceTypeConfig, _deadline: Duration) -> ProbeOutcome {
        let had_failure_left = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| if n > 0 { Some(n - 1) } else { None })
            .is_ok();
        if had_failure_left {
            ProbeOutcome::down("Unexpected status: 405")
        } else {
            ProbeOutcome::up("OK (GET fallback, status 200)", Some(20))
        }
    }
}

/// Always fails, simulating a host unreachable both directly and from
/// every network-sanity reference host.
struct AlwaysDownIsolated;

#[async_trait]
impl Probe for AlwaysDownIsolated {
    async fn check(&self, _target: &str, _config: &ServiceTypeConfig, _deadline: Duration) -> ProbeOutcome {
        ProbeOutcome::down("Request failed: connection refused")
    }
}

// ─── Scenario 1: web check happy path ───────────────────────────────────

#[tokio::test]
async fn scenario_web_check_happy_path_persists_up_and_updates_service() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(dir.path()));
    let mut probes = ProbeRegistry::standard();
    probes.register(ServiceType::Web, Arc::new(AlwaysUp));

    let engine = ProbeEngine::new(store.clone(), Arc::new(probes), EngineConfig::default());
    let svc = sample_service("svc-web-1", "nest-a", ServiceType::Web, "https://example.com");
    engine.register_service(svc.clone()).await.unwrap();

    let result = engine.check_service(&svc.nest_id, &svc.id).await.unwrap();
    assert_eq!(result.status, ProbeStatus::Up);
    assert_eq!(result.attempt, 1);

    let stored: NestService = store
        .get_typed(&svc.nest_id, DataType::Configuration.as_str(), &format!("service:{}", svc.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.last_status, ProbeStatus::Up);
    assert!(stored.last_check.is_some());

    let persisted = store.list_by_type(&svc.nest_id, DataType::MonitoringData.as_str()).await.unwrap();
    assert_eq!(persisted.len(), 1);

    engine.shutdown().await;
}

// ─── Scenario 2: HEAD 405 falls back to GET and still ends up `up` ──────

#[tokio::test]
async fn scenario_head_then_get_fallback_yields_up() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(dir.path()));
    let mut probes = ProbeRegistry::standard();
    probes.register(ServiceType::Web, Arc::new(FailsOnceThenUp { failures_left: AtomicU32::new(1) }));

    let config = EngineConfig { retry_delay: Duration::from_millis(1), ..EngineConfig::default() };
    let engine = ProbeEngine::new(store, Arc::new(probes), config);
    let svc = sample_service("svc-web-2", "nest-a", ServiceType::Web, "https://example.com/admin");
    engine.register_service(svc.clone()).await.unwrap();

    let result = engine.check_service(&svc.nest_id, &svc.id).await.unwrap();
    assert_eq!(result.status, ProbeStatus::Up);
    assert!(result.message.contains("GET fallback"));

    engine.shutdown().await;
}

// ─── Scenario 3: total isolation from every reference host yields `unknown`, not `down` ──

#[tokio::test]
async fn scenario_network_isolation_yields_unknown_not_down() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(dir.path()));
    let mut probes = ProbeRegistry::standard();
    probes.register(ServiceType::Web, Arc::new(AlwaysDownIsolated));

    let mut config = EngineConfig::default();
    config.max_retries = 1;
    config.network_connectivity_check = true;
    // Unroutable reference host: the per-host HEAD always fails, so
    // `network_is_reachable` reports no connectivity anywhere.
    config.network_test_urls = vec!["http://10.255.255.1".to_string()];

    let engine = ProbeEngine::new(store, Arc::new(probes), config);
    let svc = sample_service("svc-web-3", "nest-a", ServiceType::Web, "https://example.com");
    engine.register_service(svc.clone()).await.unwrap();

    let result = engine.check_service(&svc.nest_id, &svc.id).await.unwrap();
    assert_eq!(result.status, ProbeStatus::Unknown);
    assert!(result.message.contains("Network connectivity issue"));

    engine.shutdown().await;
}

// ─── Scenario 4: immediate failover completes and transfers load ───────

fn endpoint(id: &str, name: &str, priority: u32, status: EndpointStatus, load: u32) -> ServiceEndpoint {
    ServiceEndpoint {
        id: id.to_string(),
        name: name.to_string(),
        url: "https://example.com".to_string(),
        region: "us-east".to_string(),
        priority,
        capacity: 100,
        current_load: load,
        health_check_path: "/health".to_string(),
        status,
        last_health_check: None,
    }
}

#[tokio::test]
async fn scenario_immediate_failover_completes_and_moves_load() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(dir.path()));
    let router: Arc<dyn TrafficRouter> = Arc::new(NullTrafficRouter);
    let metrics = Arc::new(OperationsMetrics::new());
    let controller = FailoverController::new(store, router, metrics, FailoverConfig::default());

    let primary = endpoint("ep-primary", "api-primary", 1, EndpointStatus::Healthy, 40);
    let standby = endpoint("ep-standby", "api-standby", 2, EndpointStatus::Healthy, 0);
    controller.register_endpoint(primary.clone()).await.unwrap();
    controller.register_endpoint(standby.clone()).await.unwrap();

    let event = controller.trigger_failover(&primary.id, &standby.id).await.unwrap();
    assert_eq!(event.status, guardant_proto::FailoverEventStatus::Completed);
    assert_eq!(event.target_endpoint.as_deref(), Some("ep-standby"));

    let active = controller.active_failovers().await;
    assert_eq!(active.get(&primary.id), Some(&event.id));
}

// ─── Scenario 5: automatic recovery ramps traffic back in stages ───────

#[derive(Default)]
struct RecordingRouter {
    percentages: std::sync::Mutex<Vec<f64>>,
}

#[async_trait]
impl TrafficRouter for RecordingRouter {
    async fn redirect_all(&self, _source: &str, _target: &str) -> Result<(), String> {
        Ok(())
    }
    async fn redirect_percentage(&self, _source: &str, _target: &str, percentage: f64) -> Result<(), String> {
        self.percentages.lock().unwrap().push(percentage);
        Ok(())
    }
    async fn validate_ready(&self, _target: &str) -> bool {
        true
    }
}

#[tokio::test]
async fn scenario_recovery_ramps_back_through_increasing_percentages() {
    use guardant_failover::execution::FailoverExecutor;
    use std::sync::atomic::AtomicUsize;

    let recording = Arc::new(RecordingRouter::default());
    let router: Arc<dyn TrafficRouter> = recording.clone();
    let executor = FailoverExecutor::new(router.clone());
    let strategy = RecoveryStrategy {
        kind: RecoveryKind::Automatic,
        consecutive_success_required: 2,
        recovery_delay_secs: 0,
        initial_percentage: 10,
        increment_percentage: 30,
        increment_interval_secs: 0,
    };

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let outcome = guardant_failover::recovery::run(
        &strategy,
        "ep-primary",
        "ep-standby",
        &executor,
        &router,
        move || {
            let n = calls_clone.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { n >= 1 })
        },
        Duration::from_millis(1),
    )
    .await;

    assert!(matches!(outcome, guardant_failover::RecoveryOutcome::Recovered));
    let seen = recording.percentages.lock().unwrap().clone();
    assert!(!seen.is_empty());
    // Ramp is monotonically non-decreasing and ends at full restoration.
    for window in seen.windows(2) {
        assert!(window[1] >= window[0]);
    }
    assert_eq!(*seen.last().unwrap(), 100.0);
}

// ─── Scenario 6: SLA compliance over a 30-day window matches the textbook case ──

#[tokio::test]
async fn scenario_sla_compliance_over_30_days_matches_expected_figures() {
    let target = guardant_proto::SlaTarget {
        id: "sla_1".to_string(),
        nest_id: "nest-a".to_string(),
        service_id: Some("svc-1".to_string()),
        uptime: guardant_proto::MetricTarget { target: 99.9 },
        response_time: guardant_proto::ResponseTimeTarget { target_ms: 500.0, percentile: 95.0 },
        error_rate: guardant_proto::MetricTarget { target: 1.0 },
        availability: guardant_proto::MetricTarget { target: 99.9 },
        window: guardant_proto::MeasurementWindow::Monthly,
        penalty_table: vec![],
        credit_table: vec![],
        reporting_frequency: guardant_proto::ReportFrequency::Monthly,
        stakeholders: vec![],
        exclude_scheduled_maintenance: false,
        active: true,
        version: 1,
    };

    let start = Utc::now() - chrono::Duration::days(30);
    let mut results = Vec::with_capacity(43_200);
    for i in 0..43_100i64 {
        results.push(ProbeResult {
            service_id: "svc-1".to_string(),
            nest_id: "nest-a".to_string(),
            status: ProbeStatus::Up,
            message: String::new(),
            response_time: Some(100),
            timestamp: start + chrono::Duration::minutes(i),
            check_duration: 10,
            attempt: 1,
            metadata: None,
        });
    }
    for i in 43_100..43_200i64 {
        results.push(ProbeResult {
            service_id: "svc-1".to_string(),
            nest_id: "nest-a".to_string(),
            status: ProbeStatus::Down,
            message: "down".to_string(),
            response_time: None,
            timestamp: start + chrono::Duration::minutes(i),
            check_duration: 10,
            attempt: 1,
            metadata: None,
        });
    }
    let end = start + chrono::Duration::minutes(43_199);

    let measurement = compute_measurement(
        "meas_1".to_string(),
        "nest-a".to_string(),
        MeasurementInput {
            target: &target,
            window_start: start,
            window_end: end,
            results,
            expected_interval: Duration::from_secs(60),
            scheduled_downtime_minutes: 0,
        },
    );

    assert!((measurement.uptime.actual - 99.768).abs() < 0.01);
    assert_eq!(measurement.compliance_score, 75);
    assert!(!measurement.overall_compliance);
}

// ─── Rule-driven failover: a manual trigger exercises the same completion path ──

#[tokio::test]
async fn rule_registration_is_validated_and_manual_trigger_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(dir.path()));
    let router: Arc<dyn TrafficRouter> = Arc::new(NullTrafficRouter);
    let metrics = Arc::new(OperationsMetrics::new());
    let controller = FailoverController::new(store, router, metrics, FailoverConfig::default());

    let primary = endpoint("ep-p", "api-p", 1, EndpointStatus::Healthy, 50);
    let standby = endpoint("ep-s", "api-s", 2, EndpointStatus::Healthy, 0);
    controller.register_endpoint(primary.clone()).await.unwrap();
    controller.register_endpoint(standby.clone()).await.unwrap();

    let rule = guardant_proto::FailoverRule {
        id: "rule-err".to_string(),
        name: "error spike".to_string(),
        service_pattern: "^api.*".to_string(),
        trigger_conditions: vec![TriggerCondition {
            metric: "error_rate".to_string(),
            operator: ComparisonOp::Gt,
            threshold: 5.0,
            duration_secs: 0,
        }],
        failover_strategy: FailoverStrategy { kind: FailoverStrategyKind::Immediate, drain_timeout: 30, validate_target: true },
        recovery_strategy: RecoveryStrategy { kind: RecoveryKind::Manual, ..RecoveryStrategy::default() },
        target_selection: TargetSelectionStrategy::HighestPriority,
        cooldown_period_secs: 60,
        max_failovers: 3,
        time_window_secs: 3600,
        priority: 10,
        enabled: true,
    };
    controller.register_rule(rule).await.unwrap();

    let event = controller.trigger_failover(&primary.id, &standby.id).await.unwrap();
    assert_eq!(event.status, guardant_proto::FailoverEventStatus::Completed);
}
