//! Endpoint health loop: HTTP health checks, response-time classification,
//! and the per-endpoint ring buffer that backs metric derivation (spec
//! §4.5 "Endpoint health loop" / "Metric derivation").

use crate::config::FailoverConfig;
use chrono::{DateTime, Utc};
use guardant_metrics::{mean, rate_pct, RingBuffer, Timestamped};
use guardant_proto::{EndpointStatus, ServiceEndpoint};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::debug;

/// One classified health observation, single-writer per endpoint.
#[derive(Debug, Clone)]
pub struct HealthSample {
    pub timestamp: DateTime<Utc>,
    pub healthy: bool,
    pub response_time_ms: Option<u64>,
    pub status: EndpointStatus,
}

impl Timestamped for HealthSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Derived over the last 60s of an endpoint's ring buffer (spec §4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointMetrics {
    pub response_time: f64,
    pub error_rate: f64,
    pub availability: f64,
}

/// Emitted whenever a health check causes an endpoint to cross a status
/// boundary. Broadcast rather than returned, so the rule evaluator and any
/// other interested component can subscribe independently (the
/// "message-passing, not shared mutable maps" redesign).
#[derive(Debug, Clone)]
pub struct EndpointStatusChanged {
    pub endpoint_id: String,
    pub previous: EndpointStatus,
    pub current: EndpointStatus,
}

const METRIC_WINDOW: Duration = Duration::from_secs(60);
const MOVING_AVERAGE_SAMPLES: usize = 10;
const SLOW_AVERAGE_FLOOR_MS: f64 = 1000.0;
const SLOW_MULTIPLIER: f64 = 2.0;

pub struct EndpointHealthLoop {
    client: reqwest::Client,
    config: FailoverConfig,
    buffers: RwLock<HashMap<String, Arc<RingBuffer<HealthSample>>>>,
    status_tx: broadcast::Sender<EndpointStatusChanged>,
}

impl EndpointHealthLoop {
    pub fn new(config: FailoverConfig) -> Self {
        let (status_tx, _rx) = broadcast::channel(256);
        Self { client: reqwest::Client::new(), config, buffers: RwLock::new(HashMap::new()), status_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EndpointStatusChanged> {
        self.status_tx.subscribe()
    }

    fn buffer_for(&self, endpoint_id: &str) -> Arc<RingBuffer<HealthSample>> {
        if let Some(buf) = self.buffers.read().get(endpoint_id) {
            return Arc::clone(buf);
        }
        let mut guard = self.buffers.write();
        Arc::clone(
            guard
                .entry(endpoint_id.to_string())
                .or_insert_with(|| Arc::new(RingBuffer::new(self.config.ring_buffer_capacity()))),
        )
    }

    /// Check one endpoint, classify the result, push it into that
    /// endpoint's ring buffer, and broadcast a transition if the
    /// classification changed from `previous_status`. Maintenance
    /// endpoints are the caller's responsibility to skip (spec §4.5:
    /// "loop skips it").
    pub async fn check_endpoint(&self, endpoint: &ServiceEndpoint, previous_status: EndpointStatus) -> HealthSample {
        let buffer = self.buffer_for(&endpoint.id);
        let url = endpoint.health_check_url();
        let start = Instant::now();
        let attempt = tokio::time::timeout(self.config.health_check_timeout, self.client.get(&url).send()).await;

        let (healthy, response_time_ms) = match attempt {
            Ok(Ok(resp)) if resp.status().is_success() => (true, Some(start.elapsed().as_millis() as u64)),
            _ => (false, None),
        };

        let status = if !healthy {
            EndpointStatus::Unhealthy
        } else {
            let prior_healthy_rt: Vec<f64> = buffer
                .snapshot()
                .into_iter()
                .rev()
                .filter(|s| s.status == EndpointStatus::Healthy)
                .filter_map(|s| s.response_time_ms)
                .take(MOVING_AVERAGE_SAMPLES)
                .map(|v| v as f64)
                .collect();
            let moving_average = mean(&prior_healthy_rt);
            let this_rt = response_time_ms.unwrap_or(0) as f64;
            match moving_average {
                Some(avg) if avg > SLOW_AVERAGE_FLOOR_MS && this_rt > SLOW_MULTIPLIER * avg => EndpointStatus::Degraded,
                _ => EndpointStatus::Healthy,
            }
        };

        let sample = HealthSample { timestamp: Utc::now(), healthy, response_time_ms, status };
        buffer.push(sample.clone());

        if status != previous_status {
            debug!(endpoint_id = %endpoint.id, ?previous_status, ?status, "endpoint status changed");
            let _ = self.status_tx.send(EndpointStatusChanged {
                endpoint_id: endpoint.id.clone(),
                previous: previous_status,
                current: status,
            });
        }

        sample
    }

    /// Derive `response_time` (mean), `error_rate`, and `availability`
    /// over the last 60s of samples (spec §4.5 "Metric derivation").
    pub fn metrics_for(&self, endpoint_id: &str) -> EndpointMetrics {
        let buffer = self.buffer_for(endpoint_id);
        let recent = buffer.within_window(Utc::now(), METRIC_WINDOW);
        if recent.is_empty() {
            return EndpointMetrics::default();
        }
        let response_times: Vec<f64> = recent.iter().filter_map(|s| s.response_time_ms).map(|v| v as f64).collect();
        EndpointMetrics {
            response_time: mean(&response_times).unwrap_or(0.0),
            error_rate: rate_pct(&recent, |s| !s.healthy),
            availability: rate_pct(&recent, |s| s.healthy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(url: &str) -> ServiceEndpoint {
        ServiceEndpoint {
            id: "ep-1".to_string(),
            name: "api".to_string(),
            url: url.to_string(),
            region: "us-east".to_string(),
            priority: 1,
            capacity: 100,
            current_load: 0,
            health_check_path: "/health".to_string(),
            status: EndpointStatus::Healthy,
            last_health_check: None,
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_classifies_unhealthy_and_broadcasts() {
        let loop_ = EndpointHealthLoop::new(FailoverConfig {
            health_check_timeout: Duration::from_millis(50),
            ..FailoverConfig::default()
        });
        let mut rx = loop_.subscribe();
        let ep = endpoint("http://10.255.255.1");

        let sample = loop_.check_endpoint(&ep, EndpointStatus::Healthy).await;
        assert_eq!(sample.status, EndpointStatus::Unhealthy);
        assert!(!sample.healthy);

        let event = rx.try_recv().expect("status change broadcast");
        assert_eq!(event.previous, EndpointStatus::Healthy);
        assert_eq!(event.current, EndpointStatus::Unhealthy);
    }

    #[test]
    fn metrics_for_unknown_endpoint_is_zeroed() {
        let loop_ = EndpointHealthLoop::new(FailoverConfig::default());
        let metrics = loop_.metrics_for("never-seen");
        assert_eq!(metrics.availability, 0.0);
        assert_eq!(metrics.error_rate, 0.0);
    }
}
