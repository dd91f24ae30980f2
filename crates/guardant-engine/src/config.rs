//! Recognized `monitoring.*` configuration keys (spec §6).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub check_timeout: Duration,
    pub concurrent_checks: usize,
    pub network_connectivity_check: bool,
    pub network_test_urls: Vec<String>,
    /// Whether successful/failed probe results are persisted to
    /// `MONITORING_DATA`. The service's last-known fields are always
    /// updated regardless.
    pub store_metrics: bool,
    /// Bounded grace period for in-flight probes to finish on shutdown.
    pub shutdown_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            check_timeout: Duration::from_secs(10),
            concurrent_checks: 10,
            network_connectivity_check: true,
            network_test_urls: vec![
                "https://dns.google".to_string(),
                "https://cloudflare.com".to_string(),
                "https://google.com".to_string(),
            ],
            store_metrics: true,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}
