//! guardantd — the GuardAnt composition-root binary.
//!
//! Wires the Tenant Data Store, Probe Engine, Job System, Failover
//! Controller, and SLA Manager into one process and exposes a small CLI
//! over them. Everything the CLI can do is also a library call — `main.rs`
//! is intentionally thin.

#![forbid(unsafe_code)]

pub mod commands;
pub mod error;
pub mod jobs;
pub mod system;

pub use error::{GuardantdError, GuardantdResult};
pub use system::System;
