//! The Probe Engine (spec component C3): owns the service registry,
//! per-service scheduling, retry-with-network-sanity, and result
//! persistence through the tenant data store.

#![forbid(unsafe_code)]

mod config;
mod error;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};

use chrono::Utc;
use guardant_probes::{ProbeOutcome, ProbeRegistry};
use guardant_proto::{DataType, NestService, ProbeResult, ProbeStatus};
use guardant_store::{Store, StoreExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

fn service_key(id: &str) -> String {
    format!("service:{id}")
}

struct ServiceHandle {
    task: JoinHandle<()>,
    in_flight: Arc<AtomicBool>,
}

/// Owns scheduling, retry policy, result persistence, and service-status
/// updates for every registered service.
pub struct ProbeEngine {
    store: Arc<dyn Store>,
    probes: Arc<ProbeRegistry>,
    config: EngineConfig,
    semaphore: Arc<Semaphore>,
    handles: RwLock<HashMap<String, ServiceHandle>>,
    http_client: reqwest::Client,
    shutdown_tx: watch::Sender<bool>,
}

impl ProbeEngine {
    pub fn new(store: Arc<dyn Store>, probes: Arc<ProbeRegistry>, config: EngineConfig) -> Arc<Self> {
        let (shutdown_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(config.concurrent_checks)),
            store,
            probes,
            config,
            handles: RwLock::new(HashMap::new()),
            http_client: reqwest::Client::new(),
            shutdown_tx,
        })
    }

    /// Register (or re-register) a service: persists it, then installs a
    /// periodic ticker at `service.interval` seconds. Re-registration
    /// cancels the prior timer atomically before installing the new one.
    pub async fn register_service(self: &Arc<Self>, service: NestService) -> EngineResult<()> {
        self.store
            .put_typed(&service.nest_id, DataType::Configuration.as_str(), &service_key(&service.id), &service)
            .await?;

        let mut handles = self.handles.write().await;
        if let Some(prev) = handles.remove(&service.id) {
            prev.task.abort();
        }

        let in_flight = Arc::new(AtomicBool::new(false));
        let engine = Arc::clone(self);
        let service_id = service.id.clone();
        let nest_id = service.nest_id.clone();
        let interval_secs = service.interval.max(1);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                        engine.run_scheduled_tick(&nest_id, &service_id).await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        handles.insert(service.id.clone(), ServiceHandle { task, in_flight });
        Ok(())
    }

    /// Cancel a service's schedule, e.g. when the owning API deletes it.
    pub async fn unregister_service(&self, service_id: &str) {
        if let Some(handle) = self.handles.write().await.remove(service_id) {
            handle.task.abort();
        }
    }

    async fn run_scheduled_tick(self: &Arc<Self>, nest_id: &str, service_id: &str) {
        let in_flight = {
            let handles = self.handles.read().await;
            handles.get(service_id).map(|h| Arc::clone(&h.in_flight))
        };
        let Some(in_flight) = in_flight else { return };

        // Per-service: at most one probe in flight. A pile-up under
        // prolonged upstream latency drops the tick rather than queuing it.
        if in_flight.swap(true, Ordering::SeqCst) {
            debug!(service_id, "previous probe still running, dropping tick");
            return;
        }

        let result = self.check_service(nest_id, service_id).await;
        in_flight.store(false, Ordering::SeqCst);

        if let Err(e) = result {
            error!(service_id, error = %e, "probe engine invariant error");
        }
    }

    /// Run the full check-orchestration contract (spec §4.3) for one
    /// service: resolve executor, attempt loop with retry and network
    /// sanity, persist the result and the service's last-known fields.
    pub async fn check_service(self: &Arc<Self>, nest_id: &str, service_id: &str) -> EngineResult<ProbeResult> {
        let _permit = self.semaphore.acquire().await.expect("semaphore not closed");

        let mut service: NestService = self
            .store
            .get_typed(nest_id, DataType::Configuration.as_str(), &service_key(service_id))
            .await?
            .ok_or_else(|| EngineError::UnknownService(service_id.to_string()))?;

        let started_at = std::time::Instant::now();
        let executor = self.probes.get(service.service_type);

        let (final_outcome, attempt) = match executor {
            None => (ProbeOutcome::down("Unknown service type"), 1),
            Some(probe) => {
                let mut last = ProbeOutcome::down("No attempts executed");
                let mut attempt_n = 0;
                for attempt in 1..=self.config.max_retries.max(1) {
                    attempt_n = attempt;
                    last = probe.check(&service.target, &service.config, self.config.check_timeout).await;
                    if last.status == ProbeStatus::Up {
                        break;
                    }
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }

                if last.status != ProbeStatus::Up && self.config.network_connectivity_check {
                    if !self.network_is_reachable().await {
                        last = ProbeOutcome {
                            status: ProbeStatus::Unknown,
                            response_time: None,
                            message: "Network connectivity issue: unable to reach any reference host".to_string(),
                            metadata: None,
                        };
                    }
                }
                (last, attempt_n)
            }
        };

        let check_duration = started_at.elapsed().as_millis() as u64;
        let timestamp = Utc::now();
        let probe_result = ProbeResult {
            service_id: service.id.clone(),
            nest_id: nest_id.to_string(),
            status: final_outcome.status,
            message: final_outcome.message.clone(),
            response_time: final_outcome.response_time,
            timestamp,
            check_duration,
            attempt,
            metadata: final_outcome.metadata.clone(),
        };

        if self.config.store_metrics {
            if let Err(e) = self
                .store
                .put_typed(nest_id, DataType::MonitoringData.as_str(), &probe_result.store_key(), &probe_result)
                .await
            {
                warn!(service_id, error = %e, "failed to persist probe result, continuing");
            }
        }

        service.apply_probe_update(
            final_outcome.status,
            final_outcome.message,
            final_outcome.response_time,
            probe_result.attempt.saturating_sub(1),
            timestamp,
        );
        if let Err(e) = self
            .store
            .put_typed(nest_id, DataType::Configuration.as_str(), &service_key(service_id), &service)
            .await
        {
            warn!(service_id, error = %e, "failed to persist service status update, continuing");
        }

        Ok(probe_result)
    }

    /// HEAD at least one of the configured reference hosts with a 3s
    /// timeout; `true` if any respond.
    async fn network_is_reachable(&self) -> bool {
        for url in &self.config.network_test_urls {
            let attempt = tokio::time::timeout(Duration::from_secs(3), self.http_client.head(url).send()).await;
            if matches!(attempt, Ok(Ok(_))) {
                return true;
            }
        }
        false
    }

    /// Cancel all timers and wait up to the configured grace period for
    /// in-flight probes to finish, then force-terminate stragglers.
    pub async fn shutdown(&self) {
        info!("probe engine shutting down");
        let _ = self.shutdown_tx.send(true);

        let handles = {
            let mut guard = self.handles.write().await;
            std::mem::take(&mut *guard)
        };
        let tasks: Vec<JoinHandle<()>> = handles.into_values().map(|h| h.task).collect();
        let joined = tokio::time::timeout(self.config.shutdown_grace, futures_util::future::join_all(tasks)).await;
        if joined.is_err() {
            warn!("probe engine shutdown grace period exceeded, remaining tasks will be aborted on drop");
        }
        info!("probe engine shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use guardant_proto::{ProbeStatus, ServiceType, ServiceTypeConfig};
    use guardant_store::JsonFileStore;

    struct AlwaysUp;

    #[async_trait]
    impl guardant_probes::Probe for AlwaysUp {
        async fn check(&self, _target: &str, _config: &ServiceTypeConfig, _deadline: Duration) -> ProbeOutcome {
            ProbeOutcome::up("ok", Some(5))
        }
    }

    fn sample_service(id: &str) -> NestService {
        let now = Utc::now();
        NestService {
            id: id.to_string(),
            nest_id: "nest-a".to_string(),
            name: "svc".to_string(),
            order: None,
            tags: vec![],
            alerting_enabled: true,
            service_type: ServiceType::Web,
            target: "https://example.com".to_string(),
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

    #[tokio::test]
    async fn check_service_persists_result_and_updates_last_status() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(dir.path()));
        let mut probes = ProbeRegistry::standard();
        probes.register(ServiceType::Web, Arc::new(AlwaysUp));

        let engine = ProbeEngine::new(store.clone(), Arc::new(probes), EngineConfig::default());
        let svc = sample_service("svc-1");
        engine.register_service(svc.clone()).await.unwrap();

        let result = engine.check_service(&svc.nest_id, &svc.id).await.unwrap();
        assert_eq!(result.status, ProbeStatus::Up);

        let stored: NestService = store
            .get_typed(&svc.nest_id, DataType::Configuration.as_str(), &service_key(&svc.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.last_status, ProbeStatus::Up);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_service_type_is_down_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(dir.path()));
        let engine = ProbeEngine::new(store, Arc::new(ProbeRegistry::empty()), EngineConfig::default());
        let svc = sample_service("svc-2");
        engine.register_service(svc.clone()).await.unwrap();
        let result = engine.check_service(&svc.nest_id, &svc.id).await.unwrap();
        assert_eq!(result.status, ProbeStatus::Down);
        assert_eq!(result.message, "Unknown service type");
        assert_eq!(result.attempt, 1);
        engine.shutdown().await;
    }
}
