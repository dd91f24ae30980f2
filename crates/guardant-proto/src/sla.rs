//! SLA contract and measurement types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementWindow {
    Monthly,
    Quarterly,
    Yearly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFrequency {
    Weekly,
    Monthly,
    Quarterly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricTarget {
    pub target: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTimeTarget {
    pub target_ms: f64,
    /// Percentile to compare against `target_ms`, e.g. 95.0 for p95.
    pub percentile: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyTier {
    /// Which of the four metrics (`uptime`, `response_time`, `error_rate`,
    /// `availability`) this tier evaluates.
    pub metric: String,
    pub threshold: f64,
    pub penalty_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTier {
    pub metric: String,
    pub threshold: f64,
    pub credit_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaTarget {
    pub id: String,
    pub nest_id: String,
    pub service_id: Option<String>,
    pub uptime: MetricTarget,
    pub response_time: ResponseTimeTarget,
    pub error_rate: MetricTarget,
    pub availability: MetricTarget,
    pub window: MeasurementWindow,
    pub penalty_table: Vec<PenaltyTier>,
    pub credit_table: Vec<CreditTier>,
    pub reporting_frequency: ReportFrequency,
    pub stakeholders: Vec<String>,
    #[serde(default)]
    pub exclude_scheduled_maintenance: bool,
    pub active: bool,
    pub version: u32,
}

impl SlaTarget {
    /// Validation per §4.6: each percentage-shaped target in range, response
    /// time non-negative.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.uptime.target) {
            return Err("uptime.target must be within [0,100]".to_string());
        }
        if self.response_time.target_ms < 0.0 {
            return Err("responseTime.target must be >= 0".to_string());
        }
        if !(0.0..=100.0).contains(&self.error_rate.target) {
            return Err("errorRate.target must be within [0,100]".to_string());
        }
        if !(0.0..=100.0).contains(&self.availability.target) {
            return Err("availability.target must be within [0,100]".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricOutcome {
    pub actual: f64,
    pub target: f64,
    pub compliant: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQuality {
    pub completeness: f64,
    pub gaps: Vec<DataGap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataGap {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedPenalty {
    pub metric: String,
    pub threshold: f64,
    pub penalty_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarnedCredit {
    pub metric: String,
    pub threshold: f64,
    pub credit_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaMeasurement {
    pub id: String,
    pub sla_target_id: String,
    pub nest_id: String,
    pub service_id: Option<String>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub uptime: MetricOutcome,
    pub response_time: MetricOutcome,
    pub error_rate: MetricOutcome,
    pub availability: MetricOutcome,
    pub overall_compliance: bool,
    pub compliance_score: f64,
    pub applied_penalties: Vec<AppliedPenalty>,
    pub earned_credits: Vec<EarnedCredit>,
    pub data_quality: DataQuality,
    pub computed_at: DateTime<Utc>,
}
