//! Failover domain types: rules, trigger conditions, strategies, and the
//! [`FailoverEvent`] state machine record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
}

impl ComparisonOp {
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Gt => lhs > rhs,
            Self::Gte => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Lte => lhs <= rhs,
            Self::Eq => (lhs - rhs).abs() < f64::EPSILON,
            Self::Neq => (lhs - rhs).abs() >= f64::EPSILON,
        }
    }
}

/// A metric name condition evaluates against. Metrics are derived from the
/// endpoint's ring buffer by the rule evaluator (`response_time`,
/// `error_rate`, `availability`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerCondition {
    pub metric: String,
    pub operator: ComparisonOp,
    pub threshold: f64,
    /// Condition must hold continuously for this many seconds. Informational
    /// for the evaluator, which only sees the last-60s window in practice.
    #[serde(default)]
    pub duration_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverStrategyKind {
    Immediate,
    Gradual,
    BlueGreen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverStrategy {
    pub kind: FailoverStrategyKind,
    /// Used by `gradual`: total seconds over which traffic is drained.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: u64,
    /// Used by `blue_green`: HEAD-check the target before cutover.
    #[serde(default = "default_true")]
    pub validate_target: bool,
}

fn default_drain_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryKind {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryStrategy {
    pub kind: RecoveryKind,
    pub consecutive_success_required: u32,
    pub recovery_delay_secs: u64,
    pub initial_percentage: u32,
    pub increment_percentage: u32,
    pub increment_interval_secs: u64,
}

impl Default for RecoveryStrategy {
    fn default() -> Self {
        Self {
            kind: RecoveryKind::Automatic,
            consecutive_success_required: 3,
            recovery_delay_secs: 30,
            initial_percentage: 10,
            increment_percentage: 30,
            increment_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSelectionStrategy {
    HighestPriority,
    LowestLoad,
    Random,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverRule {
    pub id: String,
    pub name: String,
    /// Regex over endpoint names.
    pub service_pattern: String,
    pub trigger_conditions: Vec<TriggerCondition>,
    pub failover_strategy: FailoverStrategy,
    pub recovery_strategy: RecoveryStrategy,
    #[serde(default)]
    pub target_selection: TargetSelectionStrategy,
    pub cooldown_period_secs: u64,
    pub max_failovers: u32,
    pub time_window_secs: u64,
    pub priority: i32,
    pub enabled: bool,
}

impl Default for TargetSelectionStrategy {
    fn default() -> Self {
        Self::HighestPriority
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverEventStatus {
    Triggered,
    InProgress,
    Completed,
    Failed,
    Recovering,
    Recovered,
}

impl FailoverEventStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Recovered)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatedCondition {
    pub metric: String,
    pub operator: ComparisonOp,
    pub threshold: f64,
    pub observed: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverEvent {
    pub id: String,
    pub rule_id: String,
    pub source_endpoint: String,
    pub target_endpoint: Option<String>,
    pub trigger_reason: String,
    pub conditions: Vec<EvaluatedCondition>,
    pub status: FailoverEventStatus,
    pub timestamp: DateTime<Utc>,
    pub duration: Option<u64>,
    pub recovered_at: Option<DateTime<Utc>>,
}
