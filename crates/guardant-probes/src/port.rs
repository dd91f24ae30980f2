//! Port check with optional banner grab (spec §4.2 "Port").

use crate::registry::{Probe, ProbeOutcome};
use async_trait::async_trait;
use guardant_proto::ServiceTypeConfig;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

pub struct PortProbe;

const BANNER_READ_TIMEOUT: Duration = Duration::from_secs(2);
const BANNER_READ_CAP: usize = 1024;

#[async_trait]
impl Probe for PortProbe {
    async fn check(&self, target: &str, config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        let cfg = config.port_config.clone().unwrap_or_default();
        if cfg.udp {
            return ProbeOutcome::down("UDP monitoring not yet implemented");
        }

        let start = Instant::now();
        let mut stream = match tokio::time::timeout(deadline, TcpStream::connect(target)).await {
            Err(_) => return crate::timeout_outcome(),
            Ok(Err(e)) => return ProbeOutcome::down(format!("Connection failed: {e}")),
            Ok(Ok(s)) => s,
        };

        let Some(banner) = &cfg.banner else {
            return ProbeOutcome::up("Connected", Some(crate::elapsed_ms(start)));
        };

        let mut buf = vec![0u8; BANNER_READ_CAP];
        let read = tokio::time::timeout(BANNER_READ_TIMEOUT, stream.read(&mut buf)).await;
        let n = match read {
            Err(_) => return ProbeOutcome::down("Timed out waiting for banner"),
            Ok(Err(e)) => return ProbeOutcome::down(format!("Failed to read banner: {e}")),
            Ok(Ok(n)) => n,
        };
        let received = String::from_utf8_lossy(&buf[..n]);
        if received.contains(banner.as_str()) {
            ProbeOutcome::up(
                format!("Banner matched: '{banner}'"),
                Some(crate::elapsed_ms(start)),
            )
        } else {
            ProbeOutcome::down(format!("Banner mismatch: expected '{banner}', got '{received}'"))
        }
    }
}
