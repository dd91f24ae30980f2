//! Cloud provider status feed checks (spec §4.2 "Cloud health").

use crate::registry::{Probe, ProbeOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use guardant_proto::ServiceTypeConfig;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};

const AWS_DEFAULT_FEED: &str = "https://status.aws.amazon.com/rss/all.rss";
const AZURE_DEFAULT_FEED: &str = "https://azurestatuscdn.azureedge.net/en-us/status/feed/";
const GCP_DEFAULT_FEED: &str = "https://status.cloud.google.com/incidents.json";

const TROUBLE_WORDS: &[&str] = &["degraded", "disruption", "outage", "incident"];

fn feed_url(config: &ServiceTypeConfig, default: &str) -> String {
    config
        .cloud_config
        .as_ref()
        .and_then(|c| c.feed_url.clone())
        .unwrap_or_else(|| default.to_string())
}

async fn scan_rss_feed(client: &Client, url: &str, deadline: Duration) -> ProbeOutcome {
    let start = Instant::now();
    let resp = match tokio::time::timeout(deadline, client.get(url).send()).await {
        Err(_) => return crate::timeout_outcome(),
        Ok(Err(e)) => return ProbeOutcome::down(format!("Request failed: {e}")),
        Ok(Ok(r)) => r,
    };
    let remaining = deadline.saturating_sub(start.elapsed());
    let body = match tokio::time::timeout(remaining, resp.text()).await {
        Err(_) => return crate::timeout_outcome(),
        Ok(Err(e)) => return ProbeOutcome::down(format!("Failed to read feed: {e}")),
        Ok(Ok(b)) => b,
    };
    let lower = body.to_lowercase();
    let hit = TROUBLE_WORDS.iter().find(|w| lower.contains(*w));
    let rt = crate::elapsed_ms(start);
    match hit {
        Some(word) => ProbeOutcome::down(format!("Status feed mentions '{word}'")),
        None => ProbeOutcome::up("No incidents mentioned in status feed", Some(rt)),
    }
}

#[derive(Deserialize)]
struct GcpIncident {
    #[serde(default)]
    end: Option<DateTime<Utc>>,
}

async fn scan_gcp_feed(client: &Client, url: &str, deadline: Duration) -> ProbeOutcome {
    let start = Instant::now();
    let resp = match tokio::time::timeout(deadline, client.get(url).send()).await {
        Err(_) => return crate::timeout_outcome(),
        Ok(Err(e)) => return ProbeOutcome::down(format!("Request failed: {e}")),
        Ok(Ok(r)) => r,
    };
    let remaining = deadline.saturating_sub(start.elapsed());
    let incidents: Vec<GcpIncident> = match tokio::time::timeout(remaining, resp.json()).await {
        Err(_) => return crate::timeout_outcome(),
        Ok(Err(e)) => return ProbeOutcome::down(format!("Malformed incidents feed: {e}")),
        Ok(Ok(v)) => v,
    };
    let now = Utc::now();
    let unresolved = incidents
        .iter()
        .filter(|i| i.end.is_none() || i.end.is_some_and(|e| e > now))
        .count();
    let rt = crate::elapsed_ms(start);
    if unresolved > 0 {
        ProbeOutcome::down(format!("{unresolved} unresolved incident(s)"))
    } else {
        ProbeOutcome::up("No unresolved incidents", Some(rt))
    }
}

#[derive(Default)]
pub struct AwsHealthProbe {
    client: Client,
}

#[async_trait]
impl Probe for AwsHealthProbe {
    async fn check(&self, _target: &str, config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        scan_rss_feed(&self.client, &feed_url(config, AWS_DEFAULT_FEED), deadline).await
    }
}

#[derive(Default)]
pub struct AzureHealthProbe {
    client: Client,
}

#[async_trait]
impl Probe for AzureHealthProbe {
    async fn check(&self, _target: &str, config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        scan_rss_feed(&self.client, &feed_url(config, AZURE_DEFAULT_FEED), deadline).await
    }
}

#[derive(Default)]
pub struct GcpHealthProbe {
    client: Client,
}

#[async_trait]
impl Probe for GcpHealthProbe {
    async fn check(&self, _target: &str, config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        scan_gcp_feed(&self.client, &feed_url(config, GCP_DEFAULT_FEED), deadline).await
    }
}
