//! The GuardAnt configuration surface (spec §6): every recognized key
//! under `monitoring.*`, `failover.*`, `jobs.<queue>.*`, and `sla.*`, with
//! the spec's documented defaults, loaded from and snapshotted to a single
//! JSON file.
//!
//! This crate is deliberately decoupled from `guardant-engine` /
//! `guardant-failover` / `guardant-jobs` / `guardant-sla` — it only knows
//! about plain values. The composition root is what turns a
//! [`GuardantConfig`] into each component's own config type.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unrecognized queue name: {0}")]
    UnknownQueue(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfig {
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub check_timeout_ms: u64,
    pub concurrent_checks: usize,
    pub network_connectivity_check: bool,
    pub network_test_urls: Vec<String>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_secs: 5,
            check_timeout_ms: 10_000,
            concurrent_checks: 10,
            network_connectivity_check: true,
            network_test_urls: vec![
                "https://dns.google".to_string(),
                "https://cloudflare.com".to_string(),
                "https://google.com".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverConfig {
    pub health_check_interval_secs: u64,
    pub health_check_timeout_secs: u64,
    pub health_check_retries: u32,
    pub detection_interval_secs: u64,
    pub max_concurrent_failovers: usize,
    /// How long a bounded endpoint ring buffer retains samples for.
    pub metrics_retention_period_secs: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            health_check_interval_secs: 30,
            health_check_timeout_secs: 10,
            health_check_retries: 3,
            detection_interval_secs: 15,
            max_concurrent_failovers: 5,
            metrics_retention_period_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSettings {
    pub max_concurrency: usize,
    pub default_timeout_secs: u64,
    pub rate_limit_per_second: Option<f64>,
}

/// The five fixed priority queues (spec §4.4), each independently
/// configurable. Defaults mirror the job system's own built-ins so a
/// config file that omits `jobs` entirely reproduces the same behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsConfig {
    pub critical: QueueSettings,
    pub high: QueueSettings,
    pub normal: QueueSettings,
    pub low: QueueSettings,
    pub bulk: QueueSettings,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            critical: QueueSettings { max_concurrency: 10, default_timeout_secs: 30, rate_limit_per_second: None },
            high: QueueSettings { max_concurrency: 8, default_timeout_secs: 30, rate_limit_per_second: None },
            normal: QueueSettings { max_concurrency: 5, default_timeout_secs: 30, rate_limit_per_second: None },
            low: QueueSettings { max_concurrency: 3, default_timeout_secs: 60, rate_limit_per_second: Some(5.0) },
            bulk: QueueSettings { max_concurrency: 2, default_timeout_secs: 120, rate_limit_per_second: Some(2.0) },
        }
    }
}

impl JobsConfig {
    /// Look up a queue's settings by its lowercase name (`"critical"`,
    /// `"high"`, `"normal"`, `"low"`, `"bulk"`).
    pub fn queue(&self, name: &str) -> ConfigResult<&QueueSettings> {
        match name {
            "critical" => Ok(&self.critical),
            "high" => Ok(&self.high),
            "normal" => Ok(&self.normal),
            "low" => Ok(&self.low),
            "bulk" => Ok(&self.bulk),
            other => Err(ConfigError::UnknownQueue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaConfig {
    pub calculation_frequency_minutes: u64,
    pub data_retention_days: u32,
    pub exclude_maintenance_windows: bool,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            calculation_frequency_minutes: 60,
            data_retention_days: 400,
            exclude_maintenance_windows: true,
        }
    }
}

/// The full recognized configuration surface (spec §6), plus an `extra`
/// bag for keys a deployment wants to carry through unrecognized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardantConfig {
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub failover: FailoverConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub sla: SlaConfig,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Loads a [`GuardantConfig`] from a JSON file on disk, holds it behind a
/// lock, and snapshots it back out on every update. Missing files load as
/// all-defaults rather than erroring, so a fresh deployment needs no
/// config file at all.
pub struct ConfigStore {
    path: PathBuf,
    config: RwLock<GuardantConfig>,
}

impl ConfigStore {
    pub fn load(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let config = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => GuardantConfig::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, config: RwLock::new(config) })
    }

    pub fn snapshot(&self) -> GuardantConfig {
        self.config.read().expect("config lock poisoned").clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut GuardantConfig)) -> ConfigResult<()> {
        {
            let mut guard = self.config.write().expect("config lock poisoned");
            f(&mut guard);
        }
        self.save()
    }

    fn save(&self) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&*self.config.read().expect("config lock poisoned"))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
