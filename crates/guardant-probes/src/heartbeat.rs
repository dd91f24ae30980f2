//! Heartbeat check (spec §4.2 "Heartbeat") — no network I/O. `lastHeartbeat`
//! is updated out-of-band via the heartbeat ingestion collaborator and flows
//! through the tenant data store onto the service row.

use crate::registry::{Probe, ProbeOutcome};
use async_trait::async_trait;
use chrono::Utc;
use guardant_proto::ServiceTypeConfig;
use std::time::Duration;

pub struct HeartbeatProbe;

#[async_trait]
impl Probe for HeartbeatProbe {
    async fn check(&self, _target: &str, config: &ServiceTypeConfig, _deadline: Duration) -> ProbeOutcome {
        let Some(cfg) = &config.heartbeat_config else {
            return ProbeOutcome::down("Missing heartbeat configuration");
        };
        let Some(last) = cfg.last_heartbeat else {
            return ProbeOutcome::down("No heartbeat received yet");
        };

        let elapsed = (Utc::now() - last).num_seconds().max(0);
        let allowed = cfg.expected_interval + cfg.tolerance;
        if elapsed <= allowed {
            ProbeOutcome::up(format!("Heartbeat {elapsed}s ago (allowed {allowed}s)"), None)
        } else {
            ProbeOutcome::down(format!(
                "Heartbeat {elapsed}s ago exceeds allowed {allowed}s"
            ))
        }
    }
}
