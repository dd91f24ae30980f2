//! `ServiceEndpoint` — an upstream instance the platform can route traffic
//! to. Distinct from a [`crate::service::NestService`]: endpoints model
//! GuardAnt's own routing infrastructure, stored under the reserved
//! `"system"` namespace, never exposed to tenant reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SYSTEM_NAMESPACE: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Maintenance,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub id: String,
    pub name: String,
    pub url: String,
    pub region: String,
    /// Lower wins.
    pub priority: u32,
    pub capacity: u32,
    pub current_load: u32,
    pub health_check_path: String,
    pub status: EndpointStatus,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl ServiceEndpoint {
    pub fn health_check_url(&self) -> String {
        format!(
            "{}{}",
            self.url.trim_end_matches('/'),
            self.health_check_path
        )
    }
}
