//! Kubernetes and Docker fleet checks (spec §4.2) — both shell out to the
//! local CLI tooling under a 10s process timeout.

use crate::registry::{Probe, ProbeOutcome};
use async_trait::async_trait;
use guardant_proto::ServiceTypeConfig;
use std::time::{Duration, Instant};
use tokio::process::Command;

const PROCESS_TIMEOUT: Duration = Duration::from_secs(10);

pub struct KubernetesProbe;

#[async_trait]
impl Probe for KubernetesProbe {
    async fn check(&self, _target: &str, config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        let Some(cfg) = &config.kubernetes_config else {
            return ProbeOutcome::down("Missing kubernetes configuration");
        };
        let start = Instant::now();
        let effective = deadline.min(PROCESS_TIMEOUT);

        let mut cmd = Command::new("kubectl");
        cmd.args(["get", "pods", "-n", &cfg.namespace, "--no-headers"]);
        if let Some(selector) = &cfg.label_selector {
            cmd.args(["-l", selector]);
        }
        cmd.kill_on_drop(true);

        let output = match tokio::time::timeout(effective, cmd.output()).await {
            Err(_) => return crate::timeout_outcome(),
            Ok(Err(e)) => return ProbeOutcome::down(format!("kubectl failed to run: {e}")),
            Ok(Ok(o)) => o,
        };
        if !output.status.success() {
            return ProbeOutcome::down(format!(
                "kubectl exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            return ProbeOutcome::down(format!("No pods found in namespace {}", cfg.namespace));
        }

        let not_running: Vec<&str> = lines
            .iter()
            .filter(|line| !line.split_whitespace().nth(2).is_some_and(|s| s == "Running"))
            .copied()
            .collect();

        let rt = crate::elapsed_ms(start);
        if not_running.is_empty() {
            ProbeOutcome::up(format!("All {} pod(s) Running", lines.len()), Some(rt))
        } else {
            ProbeOutcome::down(format!("{} pod(s) not Running", not_running.len()))
        }
    }
}

pub struct DockerProbe;

#[async_trait]
impl Probe for DockerProbe {
    async fn check(&self, _target: &str, config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        let Some(cfg) = &config.docker_config else {
            return ProbeOutcome::down("Missing docker configuration");
        };
        if cfg.containers.is_empty() {
            return ProbeOutcome::down("No containers configured to monitor");
        }
        let start = Instant::now();
        let effective = deadline.min(PROCESS_TIMEOUT);

        let mut cmd = Command::new("docker");
        cmd.args(["ps", "--format", "{{.Names}}\t{{.Status}}"]);
        cmd.kill_on_drop(true);

        let output = match tokio::time::timeout(effective, cmd.output()).await {
            Err(_) => return crate::timeout_outcome(),
            Ok(Err(e)) => return ProbeOutcome::down(format!("docker failed to run: {e}")),
            Ok(Ok(o)) => o,
        };
        if !output.status.success() {
            return ProbeOutcome::down(format!(
                "docker exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let running: Vec<(&str, &str)> = stdout
            .lines()
            .filter_map(|l| l.split_once('\t'))
            .collect();

        let missing: Vec<&String> = cfg
            .containers
            .iter()
            .filter(|name| {
                !running
                    .iter()
                    .any(|(n, status)| n == name.as_str() && status.starts_with("Up"))
            })
            .collect();

        let rt = crate::elapsed_ms(start);
        if missing.is_empty() {
            ProbeOutcome::up(format!("All {} container(s) Up", cfg.containers.len()), Some(rt))
        } else {
            ProbeOutcome::down(format!(
                "Container(s) not Up: {}",
                missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            ))
        }
    }
}
