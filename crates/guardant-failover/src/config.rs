//! Recognized `failover.*` configuration keys (spec §6).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FailoverConfig {
    pub health_check_interval: Duration,
    pub health_check_timeout: Duration,
    pub health_check_retries: u32,
    pub detection_interval: Duration,
    pub max_concurrent_failovers: usize,
    /// Ring buffer capacity for endpoint health samples, expressed as the
    /// number of samples retained at one per `health_check_interval`.
    pub metrics_retention_period: Duration,
    pub shutdown_grace: Duration,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(10),
            health_check_retries: 3,
            detection_interval: Duration::from_secs(15),
            max_concurrent_failovers: 5,
            metrics_retention_period: Duration::from_secs(3600),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl FailoverConfig {
    /// Ring buffer capacity implied by retaining `metrics_retention_period`
    /// worth of samples at the configured health-check cadence.
    pub fn ring_buffer_capacity(&self) -> usize {
        let interval = self.health_check_interval.as_secs().max(1);
        ((self.metrics_retention_period.as_secs() / interval).max(1)) as usize
    }
}
