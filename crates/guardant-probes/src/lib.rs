//! Per-service-type probe executors (spec component C2).
//!
//! Each executor is stateless and implements the sealed [`Probe`]
//! capability: `check(target, config, deadline) -> ProbeOutcome`. No
//! executor performs persistence or throws — every failure mode is
//! translated into `ProbeOutcome { status: Down, .. }` at the boundary.
//! Dispatch from `service.type` to an executor happens in [`ProbeRegistry`].

#![forbid(unsafe_code)]

mod cloud;
mod custom;
mod dns;
mod github;
mod heartbeat;
mod http_probe;
mod keyword;
mod kube_docker;
mod ping;
mod port;
mod registry;
mod ssl;
mod tcp;
mod uptime_api;

pub use registry::{Probe, ProbeOutcome, ProbeRegistry};

pub use cloud::{AwsHealthProbe, AzureHealthProbe, GcpHealthProbe};
pub use custom::CustomApiProbe;
pub use dns::DnsProbe;
pub use github::GithubProbe;
pub use heartbeat::HeartbeatProbe;
pub use http_probe::WebProbe;
pub use keyword::KeywordProbe;
pub use kube_docker::{DockerProbe, KubernetesProbe};
pub use ping::PingProbe;
pub use port::PortProbe;
pub use ssl::SslProbe;
pub use tcp::TcpProbe;
pub use uptime_api::UptimeApiProbe;

/// Shared helper: turn an elapsed [`std::time::Instant`] into milliseconds.
pub(crate) fn elapsed_ms(start: std::time::Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Every executor must honor the engine's overall deadline; this is the
/// uniform "ran out of time" result (spec §4.2 "Common contracts").
pub(crate) fn timeout_outcome() -> ProbeOutcome {
    ProbeOutcome {
        status: guardant_proto::ProbeStatus::Down,
        response_time: None,
        message: "Request timeout".to_string(),
        metadata: None,
    }
}
