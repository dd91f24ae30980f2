//! Content keyword check (spec §4.2 "Keyword").

use crate::registry::{Probe, ProbeOutcome};
use async_trait::async_trait;
use guardant_proto::ServiceTypeConfig;
use reqwest::Client;
use std::time::{Duration, Instant};

pub struct KeywordProbe {
    client: Client,
}

impl Default for KeywordProbe {
    fn default() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Probe for KeywordProbe {
    async fn check(&self, target: &str, config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        let Some(cfg) = &config.keyword_config else {
            return ProbeOutcome::down("Missing keyword configuration");
        };
        let start = Instant::now();

        let resp = match tokio::time::timeout(deadline, self.client.get(target).send()).await {
            Err(_) => return crate::timeout_outcome(),
            Ok(Err(e)) => return ProbeOutcome::down(format!("Request failed: {e}")),
            Ok(Ok(r)) => r,
        };

        let remaining = deadline.saturating_sub(start.elapsed());
        let body = match tokio::time::timeout(remaining, resp.text()).await {
            Err(_) => return crate::timeout_outcome(),
            Ok(Err(e)) => return ProbeOutcome::down(format!("Failed to read body: {e}")),
            Ok(Ok(b)) => b,
        };

        let (haystack, needle) = if cfg.case_sensitive {
            (body.clone(), cfg.keyword.clone())
        } else {
            (body.to_lowercase(), cfg.keyword.to_lowercase())
        };
        let present = haystack.contains(&needle);
        let rt = crate::elapsed_ms(start);

        if present == cfg.must_contain {
            ProbeOutcome::up(
                format!(
                    "Keyword '{}' {} as expected",
                    cfg.keyword,
                    if present { "present" } else { "absent" }
                ),
                Some(rt),
            )
        } else {
            ProbeOutcome::down(format!(
                "Keyword '{}' {} (expected must_contain={})",
                cfg.keyword, if present { "present" } else { "absent" }, cfg.must_contain
            ))
        }
    }
}
