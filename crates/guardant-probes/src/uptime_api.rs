//! Generic uptime-API feed check (spec §4.2 "Uptime-API").

use crate::registry::{Probe, ProbeOutcome};
use async_trait::async_trait;
use guardant_proto::ServiceTypeConfig;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};

pub struct UptimeApiProbe {
    client: Client,
}

impl Default for UptimeApiProbe {
    fn default() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct Feed {
    monitors: Vec<Monitor>,
}

#[derive(Deserialize)]
struct Monitor {
    name: String,
    status: String,
    #[serde(default)]
    availability: Option<f64>,
    #[serde(default)]
    incidents: Option<u32>,
}

#[async_trait]
impl Probe for UptimeApiProbe {
    async fn check(&self, target: &str, _config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        let start = Instant::now();
        let resp = match tokio::time::timeout(deadline, self.client.get(target).send()).await {
            Err(_) => return crate::timeout_outcome(),
            Ok(Err(e)) => return ProbeOutcome::down(format!("Request failed: {e}")),
            Ok(Ok(r)) => r,
        };

        let remaining = deadline.saturating_sub(start.elapsed());
        let feed: Feed = match tokio::time::timeout(remaining, resp.json()).await {
            Err(_) => return crate::timeout_outcome(),
            Ok(Err(e)) => return ProbeOutcome::down(format!("Malformed uptime feed: {e}")),
            Ok(Ok(f)) => f,
        };

        if feed.monitors.is_empty() {
            return ProbeOutcome::down("Uptime feed contains no monitors");
        }

        let any_down = feed.monitors.iter().any(|m| m.status.eq_ignore_ascii_case("down"));
        let per_monitor: Vec<_> = feed
            .monitors
            .iter()
            .map(|m| {
                json!({
                    "name": m.name,
                    "status": m.status,
                    "availability": m.availability,
                    "incidents": m.incidents,
                })
            })
            .collect();

        let rt = crate::elapsed_ms(start);
        let outcome = if any_down {
            ProbeOutcome::down(format!(
                "{} of {} monitors down",
                feed.monitors.iter().filter(|m| m.status.eq_ignore_ascii_case("down")).count(),
                feed.monitors.len()
            ))
        } else {
            ProbeOutcome::up(format!("{} monitors up/maintenance", feed.monitors.len()), Some(rt))
        };
        outcome.with_metadata(json!({ "monitors": per_monitor }))
    }
}
