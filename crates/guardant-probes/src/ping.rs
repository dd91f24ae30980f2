//! Ping check (spec §4.2 "Ping") — the fall-through order is load-bearing:
//! system ICMP ping, then a fixed set of common TCP ports, then HTTP/HTTPS
//! HEAD. A host blocking ICMP but listening on any of those still reports
//! `up`.

use crate::registry::{Probe, ProbeOutcome};
use async_trait::async_trait;
use guardant_proto::ServiceTypeConfig;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

const COMMON_PORTS: &[u16] = &[80, 443, 22, 21, 25, 53, 110, 993, 995];

pub struct PingProbe {
    client: Client,
}

impl Default for PingProbe {
    fn default() -> Self {
        Self {
            client: Client::builder().build().expect("reqwest client"),
        }
    }
}

/// Strip a scheme and any path/port suffix, leaving a bare hostname.
fn extract_hostname(target: &str) -> String {
    let without_scheme = target
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    without_scheme
        .split(['/', ':', '?'])
        .next()
        .unwrap_or(without_scheme)
        .to_string()
}

#[async_trait]
impl Probe for PingProbe {
    async fn check(&self, target: &str, _config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        let host = extract_hostname(target);
        let start = Instant::now();

        if system_ping(&host).await {
            return ProbeOutcome::up("ICMP ping succeeded", Some(crate::elapsed_ms(start)));
        }

        for port in COMMON_PORTS {
            let addr = format!("{host}:{port}");
            let remaining = deadline.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return crate::timeout_outcome();
            }
            if let Ok(Ok(_)) =
                tokio::time::timeout(remaining.min(Duration::from_secs(2)), TcpStream::connect(&addr)).await
            {
                return ProbeOutcome::up(
                    format!("TCP port {port} reachable"),
                    Some(crate::elapsed_ms(start)),
                );
            }
        }

        for scheme in ["http", "https"] {
            let url = format!("{scheme}://{host}");
            let remaining = deadline.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return crate::timeout_outcome();
            }
            let result = tokio::time::timeout(
                remaining.min(Duration::from_secs(3)),
                self_head(&self.client, &url),
            )
            .await;
            if let Ok(true) = result {
                return ProbeOutcome::up(
                    format!("{scheme} HEAD reachable"),
                    Some(crate::elapsed_ms(start)),
                );
            }
        }

        ProbeOutcome::down("Host unreachable via ICMP, common ports, and HTTP(S)")
    }
}

async fn self_head(client: &Client, url: &str) -> bool {
    client
        .head(url)
        .send()
        .await
        .map(|r| r.status().as_u16() < 500)
        .unwrap_or(false)
}

/// Shell out to the system `ping` binary: one packet, ~3s timeout.
async fn system_ping(host: &str) -> bool {
    let result = tokio::process::Command::new("ping")
        .args(["-c", "1", "-W", "3", host])
        .kill_on_drop(true)
        .output()
        .await;
    match result {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
