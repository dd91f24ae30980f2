//! The Failover Controller (spec component C5): endpoint health sampling,
//! rule-driven failover orchestration, and recovery ramp-up.
//!
//! Wires the pure sub-modules (`health`, `rules`, `selection`,
//! `execution`, `recovery`) to the Tenant Data Store: endpoints, rules,
//! and events all persist under the reserved [`SYSTEM_NAMESPACE`] nest id
//! (spec §3: "Failover endpoints are stored under a reserved `system`
//! namespace and are not exposed to tenant reads"). The controller itself
//! is the composition root for those pieces — each owns its registry,
//! cross-component communication is message passing (the health loop's
//! broadcast channel) rather than shared mutable maps, per the "global
//! manager singletons" redesign flag.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod execution;
pub mod health;
pub mod recovery;
pub mod rules;
pub mod selection;

pub use config::FailoverConfig;
pub use error::{FailoverError, FailoverResult};
pub use execution::FailoverExecutor;
pub use health::{EndpointHealthLoop, EndpointMetrics, EndpointStatusChanged, HealthSample};
pub use recovery::RecoveryOutcome;

use chrono::Utc;
use guardant_observe::OperationsMetrics;
use guardant_proto::{
    gen_id, DataType, EndpointStatus, FailoverEvent, FailoverEventStatus, FailoverRule,
    ServiceEndpoint, TrafficRouter, SYSTEM_NAMESPACE,
};
use guardant_store::{Store, StoreExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

fn endpoint_key(id: &str) -> String {
    format!("endpoint:{id}")
}
fn rule_key(id: &str) -> String {
    format!("rule:{id}")
}
fn event_key(id: &str) -> String {
    format!("failover-event:{id}")
}

/// Owns every endpoint, rule, and in-flight failover, and runs the two
/// background loops (health sampling, rule detection) spec §4.5 describes.
pub struct FailoverController {
    store: Arc<dyn Store>,
    router: Arc<dyn TrafficRouter>,
    metrics: Arc<OperationsMetrics>,
    config: FailoverConfig,
    health_loop: Arc<EndpointHealthLoop>,
    executor: Arc<FailoverExecutor>,
    /// One active (non-terminal) failover per source endpoint — the
    /// re-entrancy guard spec §9 leaves ambiguous in the source; this
    /// implementation chooses "same event id returned, no second event
    /// created" (spec §8 round-trip law).
    active_failovers: RwLock<HashMap<String, String>>,
    /// Serializes failover initiation so two ticks racing on the same
    /// source endpoint cannot both pass the `active_failovers` check.
    initiate_lock: Mutex<()>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl FailoverController {
    pub fn new(
        store: Arc<dyn Store>,
        router: Arc<dyn TrafficRouter>,
        metrics: Arc<OperationsMetrics>,
        config: FailoverConfig,
    ) -> Arc<Self> {
        let (shutdown_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            health_loop: Arc::new(EndpointHealthLoop::new(config.clone())),
            executor: Arc::new(FailoverExecutor::new(router.clone())),
            store,
            router,
            metrics,
            config,
            active_failovers: RwLock::new(HashMap::new()),
            initiate_lock: Mutex::new(()),
            tasks: std::sync::Mutex::new(Vec::new()),
            shutdown_tx,
        })
    }

    // ─── Endpoint registry ─────────────────────────────────────────────

    pub async fn register_endpoint(&self, endpoint: ServiceEndpoint) -> FailoverResult<()> {
        self.store
            .put_typed(SYSTEM_NAMESPACE, DataType::FailoverConfig.as_str(), &endpoint_key(&endpoint.id), &endpoint)
            .await?;
        Ok(())
    }

    pub async fn get_endpoint(&self, id: &str) -> FailoverResult<Option<ServiceEndpoint>> {
        Ok(self
            .store
            .get_typed(SYSTEM_NAMESPACE, DataType::FailoverConfig.as_str(), &endpoint_key(id))
            .await?)
    }

    async fn list_endpoints(&self) -> FailoverResult<Vec<ServiceEndpoint>> {
        let raw = self.store.list_by_type(SYSTEM_NAMESPACE, DataType::FailoverConfig.as_str()).await?;
        Ok(raw.into_iter().filter_map(|v| serde_json::from_value::<ServiceEndpoint>(v).ok()).collect())
    }

    async fn save_endpoint(&self, endpoint: &ServiceEndpoint) -> FailoverResult<()> {
        self.store
            .put_typed(SYSTEM_NAMESPACE, DataType::FailoverConfig.as_str(), &endpoint_key(&endpoint.id), endpoint)
            .await?;
        Ok(())
    }

    // ─── Rule registry ─────────────────────────────────────────────────

    pub async fn register_rule(&self, rule: FailoverRule) -> FailoverResult<()> {
        regex::Regex::new(&rule.service_pattern)
            .map_err(|e| FailoverError::InvalidPattern(rule.id.clone(), e.to_string()))?;
        self.store
            .put_typed(SYSTEM_NAMESPACE, DataType::FailoverConfig.as_str(), &rule_key(&rule.id), &rule)
            .await?;
        Ok(())
    }

    async fn list_rules(&self) -> FailoverResult<Vec<FailoverRule>> {
        let raw = self.store.list_by_type(SYSTEM_NAMESPACE, DataType::FailoverConfig.as_str()).await?;
        Ok(raw.into_iter().filter_map(|v| serde_json::from_value::<FailoverRule>(v).ok()).collect())
    }

    // ─── Event history ──────────────────────────────────────────────────

    async fn list_events(&self) -> FailoverResult<Vec<FailoverEvent>> {
        let raw = self.store.list_by_type(SYSTEM_NAMESPACE, DataType::FailoverConfig.as_str()).await?;
        Ok(raw.into_iter().filter_map(|v| serde_json::from_value::<FailoverEvent>(v).ok()).collect())
    }

    async fn save_event(&self, event: &FailoverEvent) -> FailoverResult<()> {
        self.store
            .put_typed(SYSTEM_NAMESPACE, DataType::FailoverConfig.as_str(), &event_key(&event.id), event)
            .await?;
        Ok(())
    }

    pub async fn get_event(&self, id: &str) -> FailoverResult<Option<FailoverEvent>> {
        Ok(self
            .store
            .get_typed(SYSTEM_NAMESPACE, DataType::FailoverConfig.as_str(), &event_key(id))
            .await?)
    }

    // ─── Background loops ────────────────────────────────────────────────

    /// Starts the health-sampling and rule-detection loops. Idempotent to
    /// call once per controller lifetime; call `shutdown` before dropping.
    pub fn start(self: &Arc<Self>) {
        let health_task = {
            let this = Arc::clone(self);
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(this.config.health_check_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if *shutdown_rx.borrow() { break; }
                            this.run_health_tick().await;
                        }
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() { break; }
                        }
                    }
                }
            })
        };

        let detection_task = {
            let this = Arc::clone(self);
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(this.config.detection_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if *shutdown_rx.borrow() { break; }
                            this.run_detection_tick().await;
                        }
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() { break; }
                        }
                    }
                }
            })
        };

        let mut tasks = self.tasks.lock().expect("tasks lock poisoned");
        tasks.push(health_task);
        tasks.push(detection_task);
    }

    /// One pass over every non-maintenance endpoint (spec §4.5 "Endpoint
    /// health loop"). A single endpoint's check error never halts the
    /// sweep (spec §7: "Failover Controller isolates per-endpoint
    /// failures").
    async fn run_health_tick(self: &Arc<Self>) {
        let endpoints = match self.list_endpoints().await {
            Ok(e) => e,
            Err(e) => {
                error!(error = %e, "failed to list endpoints for health sweep");
                return;
            }
        };

        for endpoint in endpoints {
            if endpoint.status == EndpointStatus::Maintenance {
                continue;
            }
            let previous = endpoint.status;
            let sample = self.health_loop.check_endpoint(&endpoint, previous).await;
            if sample.status != previous {
                let mut updated = endpoint.clone();
                updated.status = sample.status;
                updated.last_health_check = Some(sample.timestamp);
                if let Err(e) = self.save_endpoint(&updated).await {
                    warn!(endpoint_id = %endpoint.id, error = %e, "failed to persist endpoint status change");
                }
            }
        }
    }

    /// One pass of rule evaluation and, for anything that triggers,
    /// failover initiation (spec §4.5 "Rule evaluation").
    async fn run_detection_tick(self: &Arc<Self>) {
        let (rules, endpoints, history) = match futures_join(self).await {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "failed to load failover state for detection tick");
                return;
            }
        };

        let active_sources: HashSet<String> = self.active_failovers.read().await.keys().cloned().collect();
        let active_count = active_sources.len();
        let health_loop = Arc::clone(&self.health_loop);

        let triggered = rules::evaluate_tick(
            &rules,
            &endpoints,
            |id| health_loop.metrics_for(id),
            &history,
            &active_sources,
            active_count,
            self.config.max_concurrent_failovers,
        );

        for t in triggered {
            let rule = t.rule.clone();
            let source = t.source.clone();
            let conditions = t.conditions;
            let endpoints = endpoints.clone();
            let reason = format!("rule {} matched on {}", rule.name, source.name);
            if let Err(e) = self.initiate_failover(&rule, &source, &endpoints, reason, conditions).await {
                error!(rule = %rule.id, source = %source.id, error = %e, "failed to initiate failover");
            }
        }
    }

    // ─── Failover lifecycle ──────────────────────────────────────────────

    /// Select a target, create the event, drive the strategy, and — for
    /// automatic recovery strategies — spawn the recovery monitor. Holds
    /// `initiate_lock` only long enough to claim the source so two
    /// concurrent ticks can never double-trigger (spec §8 round-trip law
    /// / invariant "no two concurrent failovers for the same source").
    async fn initiate_failover(
        self: &Arc<Self>,
        rule: &FailoverRule,
        source: &ServiceEndpoint,
        endpoints: &[ServiceEndpoint],
        trigger_reason: String,
        conditions: Vec<guardant_proto::EvaluatedCondition>,
    ) -> FailoverResult<FailoverEvent> {
        let _guard = self.initiate_lock.lock().await;

        if let Some(existing_id) = self.active_failovers.read().await.get(&source.id).cloned() {
            return self
                .get_event(&existing_id)
                .await?
                .ok_or_else(|| FailoverError::UnknownEvent(existing_id));
        }

        let candidates: Vec<ServiceEndpoint> =
            endpoints.iter().filter(|e| e.status == EndpointStatus::Healthy).cloned().collect();
        let target = selection::select_target(rule.target_selection, source, &candidates)
            .ok_or_else(|| FailoverError::NoTargetAvailable(source.id.clone()))?;

        let mut event = FailoverEvent {
            id: gen_id("fo"),
            rule_id: rule.id.clone(),
            source_endpoint: source.id.clone(),
            target_endpoint: Some(target.id.clone()),
            trigger_reason,
            conditions,
            status: FailoverEventStatus::Triggered,
            timestamp: Utc::now(),
            duration: None,
            recovered_at: None,
        };
        self.save_event(&event).await?;
        self.active_failovers.write().await.insert(source.id.clone(), event.id.clone());
        self.metrics.record_failover_triggered();

        event.status = FailoverEventStatus::InProgress;
        self.save_event(&event).await?;

        let started = std::time::Instant::now();
        let outcome = self.executor.execute(&rule.failover_strategy, &source.id, &target.id).await;

        match outcome {
            Ok(()) => {
                let mut source_row = source.clone();
                let mut target_row = target.clone();
                target_row.current_load += source_row.current_load;
                source_row.status = EndpointStatus::Unhealthy;
                source_row.current_load = 0;
                self.save_endpoint(&source_row).await?;
                self.save_endpoint(&target_row).await?;

                event.status = FailoverEventStatus::Completed;
                event.duration = Some(started.elapsed().as_millis() as u64);
                self.save_event(&event).await?;
                info!(event = %event.id, source = %source.id, target = %target.id, "failover completed");

                if rule.recovery_strategy.kind == guardant_proto::RecoveryKind::Automatic {
                    self.spawn_recovery(rule.clone(), event.clone(), source_row, target_row);
                } else {
                    self.active_failovers.write().await.remove(&source.id);
                }
            }
            Err(e) => {
                event.status = FailoverEventStatus::Failed;
                event.duration = Some(started.elapsed().as_millis() as u64);
                self.save_event(&event).await?;
                self.active_failovers.write().await.remove(&source.id);
                warn!(event = %event.id, error = %e, "failover execution failed");
            }
        }

        Ok(event)
    }

    /// Explicit manual trigger entry point (distinct from rule-driven
    /// initiation): same re-entrancy guard applies — a source already
    /// mid-failover returns its existing event rather than starting a
    /// second one (spec §8).
    pub async fn trigger_failover(self: &Arc<Self>, source_id: &str, target_id: &str) -> FailoverResult<FailoverEvent> {
        let _guard = self.initiate_lock.lock().await;
        if let Some(existing_id) = self.active_failovers.read().await.get(source_id).cloned() {
            return self.get_event(&existing_id).await?.ok_or_else(|| FailoverError::UnknownEvent(existing_id));
        }
        let source = self.get_endpoint(source_id).await?.ok_or_else(|| FailoverError::UnknownEndpoint(source_id.to_string()))?;
        let target = self.get_endpoint(target_id).await?.ok_or_else(|| FailoverError::UnknownEndpoint(target_id.to_string()))?;
        if target.status != EndpointStatus::Healthy {
            return Err(FailoverError::NoTargetAvailable(target_id.to_string()));
        }

        let mut event = FailoverEvent {
            id: gen_id("fo"),
            rule_id: "manual".to_string(),
            source_endpoint: source.id.clone(),
            target_endpoint: Some(target.id.clone()),
            trigger_reason: "manual trigger".to_string(),
            conditions: vec![],
            status: FailoverEventStatus::Triggered,
            timestamp: Utc::now(),
            duration: None,
            recovered_at: None,
        };
        self.save_event(&event).await?;
        self.active_failovers.write().await.insert(source.id.clone(), event.id.clone());

        let strategy = guardant_proto::FailoverStrategy {
            kind: guardant_proto::FailoverStrategyKind::Immediate,
            drain_timeout: 60,
            validate_target: true,
        };
        match self.executor.execute(&strategy, &source.id, &target.id).await {
            Ok(()) => {
                event.status = FailoverEventStatus::Completed;
            }
            Err(_) => {
                event.status = FailoverEventStatus::Failed;
                self.active_failovers.write().await.remove(&source.id);
            }
        }
        self.save_event(&event).await?;
        Ok(event)
    }

    fn spawn_recovery(
        self: &Arc<Self>,
        rule: FailoverRule,
        mut event: FailoverEvent,
        source: ServiceEndpoint,
        target: ServiceEndpoint,
    ) {
        let this = Arc::clone(self);
        let router = Arc::clone(&self.router);
        let executor = Arc::clone(&self.executor);
        let health_check_interval = self.config.health_check_interval;

        let task = tokio::spawn(async move {
            event.status = FailoverEventStatus::Recovering;
            if let Err(e) = this.save_event(&event).await {
                warn!(event = %event.id, error = %e, "failed to persist recovering status");
            }

            let client = reqwest::Client::new();
            let probe_url = source.health_check_url();
            let probe = move || {
                let client = client.clone();
                let url = probe_url.clone();
                Box::pin(async move { client.get(&url).send().await.map(|r| r.status().is_success()).unwrap_or(false) })
                    as std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send>>
            };

            let outcome = recovery::run(
                &rule.recovery_strategy,
                &source.id,
                &target.id,
                &executor,
                &router,
                probe,
                health_check_interval,
            )
            .await;

            match outcome {
                RecoveryOutcome::Recovered => {
                    event.status = FailoverEventStatus::Recovered;
                    event.recovered_at = Some(Utc::now());
                    this.metrics.record_failover_recovered();

                    let mut source_row = source.clone();
                    source_row.status = EndpointStatus::Healthy;
                    source_row.current_load = target.current_load;
                    let mut target_row = target.clone();
                    target_row.current_load = 0;
                    if let Err(e) = this.save_endpoint(&source_row).await {
                        warn!(endpoint_id = %source.id, error = %e, "failed to persist recovered source endpoint");
                    }
                    if let Err(e) = this.save_endpoint(&target_row).await {
                        warn!(endpoint_id = %target.id, error = %e, "failed to persist drained target endpoint");
                    }
                }
                RecoveryOutcome::TimedOut => {
                    warn!(event = %event.id, "recovery monitor timed out after 24h, leaving event in recovering state");
                }
            }

            if let Err(e) = this.save_event(&event).await {
                warn!(event = %event.id, error = %e, "failed to persist final recovery event state");
            }
            this.active_failovers.write().await.remove(&source.id);
        });

        tokio::spawn(async move {
            let _ = task.await;
        });
    }

    /// Currently active (non-terminal) failovers, keyed by source endpoint.
    pub async fn active_failovers(&self) -> HashMap<String, String> {
        self.active_failovers.read().await.clone()
    }

    /// Stop accepting new ticks and wait for the background loops to
    /// exit within the configured grace period.
    pub async fn shutdown(&self) {
        info!("failover controller shutting down");
        let _ = self.shutdown_tx.send(true);
        let tasks = {
            let mut guard = self.tasks.lock().expect("tasks lock poisoned");
            std::mem::take(&mut *guard)
        };
        let joined = tokio::time::timeout(self.config.shutdown_grace, futures_util::future::join_all(tasks)).await;
        if joined.is_err() {
            warn!("failover controller shutdown grace period exceeded");
        }
        info!("failover controller shutdown complete");
    }
}

async fn futures_join(
    controller: &FailoverController,
) -> FailoverResult<(Vec<FailoverRule>, Vec<ServiceEndpoint>, Vec<FailoverEvent>)> {
    let rules = controller.list_rules().await?;
    let endpoints = controller.list_endpoints().await?;
    let history = controller.list_events().await?;
    Ok((rules, endpoints, history))
}
