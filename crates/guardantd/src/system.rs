//! Composition root: turns a [`guardant_config::GuardantConfig`] snapshot
//! into the five live components (spec §2's C1-C6, minus C2 which is
//! embedded in C3's registry) and owns their shared lifetime.

use crate::error::GuardantdResult;
use guardant_config::GuardantConfig;
use guardant_engine::{EngineConfig, ProbeEngine};
use guardant_failover::{FailoverConfig as FailoverEngineConfig, FailoverController};
use guardant_jobs::{JobSystemConfig, Priority, QueueConfig, Scheduler};
use guardant_observe::OperationsMetrics;
use guardant_probes::ProbeRegistry;
use guardant_proto::{NullTrafficRouter, TrafficRouter};
use guardant_sla::{SlaMeasurementStore, SlaTargetStore};
use guardant_store::{JsonFileStore, Store};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Everything the `run` and `exec` CLI paths need, wired up once at
/// startup and shared behind `Arc`s.
pub struct System {
    pub store: Arc<dyn Store>,
    pub probe_engine: Arc<ProbeEngine>,
    pub scheduler: Arc<Scheduler>,
    pub failover: Arc<FailoverController>,
    pub sla_targets: Arc<SlaTargetStore>,
    pub sla_measurements: Arc<SlaMeasurementStore>,
    pub metrics: Arc<OperationsMetrics>,
}

fn job_system_config(cfg: &GuardantConfig) -> JobSystemConfig {
    let mut queues = HashMap::new();
    for (priority, settings) in [
        (Priority::Critical, &cfg.jobs.critical),
        (Priority::High, &cfg.jobs.high),
        (Priority::Normal, &cfg.jobs.normal),
        (Priority::Low, &cfg.jobs.low),
        (Priority::Bulk, &cfg.jobs.bulk),
    ] {
        queues.insert(
            priority,
            QueueConfig {
                max_concurrency: settings.max_concurrency,
                default_timeout: Duration::from_secs(settings.default_timeout_secs),
                rate_limit_per_second: settings.rate_limit_per_second,
            },
        );
    }
    JobSystemConfig {
        queues,
        dispatch_tick: Duration::from_millis(50),
        shutdown_grace: Duration::from_secs(30),
    }
}

impl System {
    /// Build every component from a config snapshot and a data directory
    /// (one [`JsonFileStore`] root shared by all of C1's callers), but do
    /// not start any background loop yet — call [`System::start`] for that.
    pub async fn build(data_dir: &Path, cfg: &GuardantConfig, router: Option<Arc<dyn TrafficRouter>>) -> GuardantdResult<Self> {
        let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(data_dir));
        let metrics = Arc::new(OperationsMetrics::new());

        let engine_config = EngineConfig {
            max_retries: cfg.monitoring.max_retries,
            retry_delay: Duration::from_secs(cfg.monitoring.retry_delay_secs),
            check_timeout: Duration::from_millis(cfg.monitoring.check_timeout_ms),
            concurrent_checks: cfg.monitoring.concurrent_checks,
            network_connectivity_check: cfg.monitoring.network_connectivity_check,
            network_test_urls: cfg.monitoring.network_test_urls.clone(),
            store_metrics: true,
            shutdown_grace: Duration::from_secs(30),
        };
        let probe_engine = ProbeEngine::new(store.clone(), Arc::new(ProbeRegistry::standard()), engine_config);

        let scheduler = Scheduler::new(job_system_config(cfg));

        let router: Arc<dyn TrafficRouter> = router.unwrap_or_else(|| Arc::new(NullTrafficRouter));
        let failover_config = FailoverEngineConfig {
            health_check_interval: Duration::from_secs(cfg.failover.health_check_interval_secs),
            health_check_timeout: Duration::from_secs(cfg.failover.health_check_timeout_secs),
            health_check_retries: cfg.failover.health_check_retries,
            detection_interval: Duration::from_secs(cfg.failover.detection_interval_secs),
            max_concurrent_failovers: cfg.failover.max_concurrent_failovers,
            metrics_retention_period: Duration::from_secs(cfg.failover.metrics_retention_period_secs),
            shutdown_grace: Duration::from_secs(30),
        };
        let failover = FailoverController::new(store.clone(), router, metrics.clone(), failover_config);

        let sla_targets = Arc::new(SlaTargetStore::new(store.clone()));
        let sla_measurements = Arc::new(SlaMeasurementStore::new(store.clone()));

        Self::register_job_processors(&scheduler, &store, &sla_targets, &sla_measurements).await;

        Ok(Self {
            store,
            probe_engine,
            scheduler,
            failover,
            sla_targets,
            sla_measurements,
            metrics,
        })
    }

    async fn register_job_processors(
        scheduler: &Arc<Scheduler>,
        store: &Arc<dyn Store>,
        sla_targets: &Arc<SlaTargetStore>,
        sla_measurements: &Arc<SlaMeasurementStore>,
    ) {
        scheduler
            .register_processor(
                "sla.calculate",
                Arc::new(crate::jobs::SlaCalculationProcessor::new(
                    store.clone(),
                    sla_targets.clone(),
                    sla_measurements.clone(),
                )),
            )
            .await;
        scheduler
            .register_processor(
                "notification.dispatch",
                Arc::new(crate::jobs::NotificationDispatchProcessor::new(Arc::new(
                    guardant_proto::NullNotificationSink,
                ))),
            )
            .await;
    }

    /// Start every background loop: the job dispatcher and the failover
    /// controller's health/detection tickers. Per-service probe tickers
    /// start individually as services are registered.
    pub async fn start(&self) {
        self.scheduler.start().await;
        self.failover.start();
        tracing::info!("guardant system started");
    }

    /// Stop accepting new work and drain every component within its
    /// configured grace period (spec §5 "on component shutdown").
    pub async fn shutdown(&self) {
        tracing::info!("guardant system shutting down");
        self.probe_engine.shutdown().await;
        self.scheduler.shutdown().await;
        self.failover.shutdown().await;
    }
}
