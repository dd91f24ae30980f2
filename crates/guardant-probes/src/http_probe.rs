//! HTTP check for `web` (spec §4.2 "HTTP (`web`, `custom`)").
//!
//! Issues `HEAD`; on `403/404/405` retries with `GET`. `up` iff the
//! response indicates success for the method actually used.

use crate::registry::{Probe, ProbeOutcome};
use async_trait::async_trait;
use guardant_proto::ServiceTypeConfig;
use reqwest::{Client, Method};
use std::time::{Duration, Instant};

pub struct WebProbe {
    client: Client,
}

impl Default for WebProbe {
    fn default() -> Self {
        Self {
            client: Client::builder()
                .redirect(reqwest::redirect::Policy::limited(5))
                .build()
                .expect("reqwest client"),
        }
    }
}

#[async_trait]
impl Probe for WebProbe {
    async fn check(&self, target: &str, _config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        check_web(&self.client, target, deadline).await
    }
}

pub(crate) async fn check_web(client: &Client, target: &str, deadline: Duration) -> ProbeOutcome {
    let start = Instant::now();
    let head_result = tokio::time::timeout(deadline, client.request(Method::HEAD, target).send()).await;

    match head_result {
        Err(_) => crate::timeout_outcome(),
        Ok(Err(e)) => ProbeOutcome::down(format!("Request failed: {e}")),
        Ok(Ok(resp)) => {
            let status = resp.status();
            if status.as_u16() == 403 || status.as_u16() == 404 || status.as_u16() == 405 {
                let remaining = deadline.saturating_sub(start.elapsed());
                let get_result = tokio::time::timeout(remaining, client.get(target).send()).await;
                return match get_result {
                    Err(_) => crate::timeout_outcome(),
                    Ok(Err(e)) => ProbeOutcome::down(format!("Request failed: {e}")),
                    Ok(Ok(resp)) => {
                        let rt = crate::elapsed_ms(start);
                        if resp.status().is_success() {
                            ProbeOutcome::up(
                                format!("OK (GET fallback, status {})", resp.status()),
                                Some(rt),
                            )
                        } else {
                            ProbeOutcome::down(format!(
                                "Unexpected status (GET fallback): {}",
                                resp.status()
                            ))
                        }
                    }
                };
            }
            let rt = crate::elapsed_ms(start);
            if status.is_success() {
                ProbeOutcome::up(format!("OK (status {status})"), Some(rt))
            } else {
                ProbeOutcome::down(format!("Unexpected status: {status}"))
            }
        }
    }
}
