//! `ProbeResult` — the atomic output of one check attempt.

use crate::service::ProbeStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub service_id: String,
    pub nest_id: String,
    pub status: ProbeStatus,
    pub message: String,
    pub response_time: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub check_duration: u64,
    pub attempt: u32,
    pub metadata: Option<Value>,
}

impl ProbeResult {
    pub fn store_key(&self) -> String {
        format!("check:{}:{}", self.service_id, self.timestamp.timestamp_millis())
    }
}
