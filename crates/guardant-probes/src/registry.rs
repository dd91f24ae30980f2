//! The `Probe` capability and the type → executor dispatch table.

use async_trait::async_trait;
use guardant_proto::{ProbeStatus, ServiceType, ServiceTypeConfig};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Result of one check attempt, independent of how it was derived.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub status: ProbeStatus,
    pub response_time: Option<u64>,
    pub message: String,
    pub metadata: Option<Value>,
}

impl ProbeOutcome {
    pub fn up(message: impl Into<String>, response_time: Option<u64>) -> Self {
        Self {
            status: ProbeStatus::Up,
            response_time,
            message: message.into(),
            metadata: None,
        }
    }

    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Down,
            response_time: None,
            message: message.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A stateless, per-service-type check. Implementations never mutate their
/// inputs and must be safe to call concurrently for different services.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, target: &str, config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome;
}

/// Resolves a [`ServiceType`] to its executor.
pub struct ProbeRegistry {
    executors: HashMap<ServiceType, Arc<dyn Probe>>,
}

impl ProbeRegistry {
    /// A registry with no executors registered; useful for exercising the
    /// "unknown service type" branch of the engine's check orchestration.
    pub fn empty() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Build the registry with the production executor for every known
    /// service type.
    pub fn standard() -> Self {
        let mut executors: HashMap<ServiceType, Arc<dyn Probe>> = HashMap::new();
        executors.insert(ServiceType::Web, Arc::new(crate::WebProbe::default()));
        executors.insert(ServiceType::Tcp, Arc::new(crate::TcpProbe));
        executors.insert(ServiceType::Ping, Arc::new(crate::PingProbe::default()));
        executors.insert(ServiceType::Dns, Arc::new(crate::DnsProbe));
        executors.insert(ServiceType::Ssl, Arc::new(crate::SslProbe));
        executors.insert(ServiceType::Keyword, Arc::new(crate::KeywordProbe::default()));
        executors.insert(ServiceType::Port, Arc::new(crate::PortProbe));
        executors.insert(ServiceType::Heartbeat, Arc::new(crate::HeartbeatProbe));
        executors.insert(ServiceType::Github, Arc::new(crate::GithubProbe::default()));
        executors.insert(ServiceType::UptimeApi, Arc::new(crate::UptimeApiProbe::default()));
        executors.insert(ServiceType::Custom, Arc::new(crate::CustomApiProbe::default()));
        executors.insert(ServiceType::AwsHealth, Arc::new(crate::AwsHealthProbe::default()));
        executors.insert(ServiceType::AzureHealth, Arc::new(crate::AzureHealthProbe::default()));
        executors.insert(ServiceType::GcpHealth, Arc::new(crate::GcpHealthProbe::default()));
        executors.insert(ServiceType::Kubernetes, Arc::new(crate::KubernetesProbe));
        executors.insert(ServiceType::Docker, Arc::new(crate::DockerProbe));
        Self { executors }
    }

    pub fn get(&self, service_type: ServiceType) -> Option<Arc<dyn Probe>> {
        self.executors.get(&service_type).cloned()
    }

    /// Register or replace the executor for a service type, e.g. for tests
    /// that want to inject a fake.
    pub fn register(&mut self, service_type: ServiceType, probe: Arc<dyn Probe>) {
        self.executors.insert(service_type, probe);
    }
}

impl Default for ProbeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
