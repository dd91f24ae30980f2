//! Shared domain types for the GuardAnt monitoring core.
//!
//! Every type here is a pure data shape — no I/O, no async. The engine
//! crates (`guardant-store`, `guardant-probes`, `guardant-engine`,
//! `guardant-jobs`, `guardant-failover`, `guardant-sla`) all build on these.

#![forbid(unsafe_code)]

pub mod collaborators;
pub mod endpoint;
pub mod failover;
pub mod ids;
pub mod probe;
pub mod service;
pub mod sla;

pub use collaborators::{
    FileGenerator, NotificationChannel, NotificationSink, NullFileGenerator, NullNotificationSink,
    NullTrafficRouter, ReportFormat, TrafficRouter,
};
pub use endpoint::{EndpointStatus, ServiceEndpoint, SYSTEM_NAMESPACE};
pub use failover::{
    ComparisonOp, EvaluatedCondition, FailoverEvent, FailoverEventStatus, FailoverRule,
    FailoverStrategy, FailoverStrategyKind, RecoveryKind, RecoveryStrategy, TargetSelectionStrategy,
    TriggerCondition,
};
pub use ids::gen_id;
pub use probe::ProbeResult;
pub use service::{NestService, ProbeStatus, PutMeta, ServiceType, ServiceTypeConfig};
pub use sla::{
    AppliedPenalty, CreditTier, DataGap, DataQuality, EarnedCredit, MeasurementWindow, MetricOutcome,
    MetricTarget, PenaltyTier, ReportFrequency, ResponseTimeTarget, SlaMeasurement, SlaTarget,
};

/// The logical data-type discriminator carried on every C1 `Put`/`Get`.
/// Mirrors spec §3: every read/write carries `nestId + dataType + key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    MonitoringData,
    Configuration,
    SlaData,
    FailoverConfig,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MonitoringData => "MONITORING_DATA",
            Self::Configuration => "CONFIGURATION",
            Self::SlaData => "SLA_DATA",
            Self::FailoverConfig => "FAILOVER_CONFIG",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
