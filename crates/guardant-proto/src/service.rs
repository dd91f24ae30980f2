//! `NestService` — a monitored target owned by a tenant (a "nest").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Discriminates the ~15 protocol/service types the probe engine knows how to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
    Web,
    Tcp,
    Ping,
    Dns,
    Ssl,
    Keyword,
    Port,
    Heartbeat,
    Github,
    UptimeApi,
    Custom,
    AwsHealth,
    AzureHealth,
    GcpHealth,
    Kubernetes,
    Docker,
}

/// Last-known-good status of a service, as observed by the probe engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Down,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GithubConfig {
    pub repo_url: String,
    #[serde(default)]
    pub track_issues: bool,
    #[serde(default)]
    pub track_pulls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeApiConfig {
    pub feed_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(default = "default_dns_resolver")]
    pub resolver: String,
    #[serde(default = "default_record_type")]
    pub record_type: String,
    pub expected_value: Option<String>,
}

fn default_dns_resolver() -> String {
    "8.8.8.8".to_string()
}
fn default_record_type() -> String {
    "A".to_string()
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            resolver: default_dns_resolver(),
            record_type: default_record_type(),
            expected_value: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SslConfig {
    #[serde(default = "default_warning_days")]
    pub warning_days: u32,
}

fn default_warning_days() -> u32 {
    30
}

impl Default for SslConfig {
    fn default() -> Self {
        Self {
            warning_days: default_warning_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CloudConfig {
    /// Which cloud health feed this service tracks; informational only,
    /// the executor is selected by `ServiceType` already.
    pub feed_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KubernetesConfig {
    pub namespace: String,
    #[serde(default)]
    pub label_selector: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DockerConfig {
    pub containers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    pub keyword: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_true")]
    pub must_contain: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Seconds between expected heartbeats.
    pub expected_interval: i64,
    /// Grace period added to `expected_interval` before declaring down.
    #[serde(default)]
    pub tolerance: i64,
    /// Updated out-of-band by the heartbeat ingestion collaborator.
    pub last_heartbeat: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PortConfig {
    pub banner: Option<String>,
    #[serde(default)]
    pub udp: bool,
}

/// Exactly one of these sub-configs is meaningful for a given `ServiceType`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceTypeConfig {
    pub github: Option<GithubConfig>,
    pub uptime_config: Option<UptimeApiConfig>,
    pub dns_config: Option<DnsConfig>,
    pub ssl_config: Option<SslConfig>,
    pub cloud_config: Option<CloudConfig>,
    pub kubernetes_config: Option<KubernetesConfig>,
    pub docker_config: Option<DockerConfig>,
    pub keyword_config: Option<KeywordConfig>,
    pub heartbeat_config: Option<HeartbeatConfig>,
    pub port_config: Option<PortConfig>,
}

/// A monitored target owned by exactly one tenant ("nest").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestService {
    pub id: String,
    pub nest_id: String,
    pub name: String,
    pub order: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub alerting_enabled: bool,

    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub target: String,
    pub interval: u64,

    #[serde(default)]
    pub config: ServiceTypeConfig,

    // Last-known fields, mutated only by the probe engine.
    #[serde(default)]
    pub last_status: ProbeStatus,
    pub last_check: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub response_time: Option<u64>,
    #[serde(default)]
    pub retry_count: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NestService {
    /// Apply the engine's last-known-fields update after a completed check.
    pub fn apply_probe_update(
        &mut self,
        status: ProbeStatus,
        message: String,
        response_time: Option<u64>,
        retry_count: u32,
        at: DateTime<Utc>,
    ) {
        self.last_status = status;
        self.message = Some(message);
        self.response_time = response_time;
        self.retry_count = retry_count;
        self.last_check = Some(at);
        self.updated_at = at;
    }
}

/// Metadata accompanying a `Put` into the tenant data store; kept distinct
/// from the value itself so stores can index on it without deserializing.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PutMeta {
    pub tags: HashMap<String, String>,
}
