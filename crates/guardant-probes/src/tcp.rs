//! TCP connect check (spec §4.2 "TCP").

use crate::registry::{Probe, ProbeOutcome};
use async_trait::async_trait;
use guardant_proto::ServiceTypeConfig;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

pub struct TcpProbe;

#[async_trait]
impl Probe for TcpProbe {
    async fn check(&self, target: &str, _config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        check_tcp(target, deadline).await
    }
}

pub(crate) async fn check_tcp(target: &str, deadline: Duration) -> ProbeOutcome {
    let start = Instant::now();
    match tokio::time::timeout(deadline, TcpStream::connect(target)).await {
        Err(_) => crate::timeout_outcome(),
        Ok(Err(e)) => ProbeOutcome::down(format!("Connection failed: {e}")),
        Ok(Ok(_stream)) => ProbeOutcome::up("Connected", Some(crate::elapsed_ms(start))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_port_fails() {
        let outcome = check_tcp("127.0.0.1:1", Duration::from_millis(500)).await;
        assert_eq!(outcome.status, guardant_proto::ProbeStatus::Down);
    }
}
