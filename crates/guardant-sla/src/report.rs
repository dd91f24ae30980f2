//! Report aggregation: rolls measurements up over a reporting window and
//! classifies trend direction (spec §4.6 "Reporting").

use chrono::{DateTime, Utc};
use guardant_proto::SlaMeasurement;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Degrading,
}

/// Classify trend by comparing this window's score to the prior window's,
/// at a ±10% threshold (spec §4.6).
pub fn classify_trend(current_score: f64, previous_score: Option<f64>) -> Trend {
    let Some(previous) = previous_score else {
        return Trend::Stable;
    };
    if previous == 0.0 {
        return Trend::Stable;
    }
    let delta_pct = (current_score - previous) / previous * 100.0;
    if delta_pct >= 10.0 {
        Trend::Improving
    } else if delta_pct <= -10.0 {
        Trend::Degrading
    } else {
        Trend::Stable
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetPerformance {
    pub sla_target_id: String,
    pub service_id: Option<String>,
    pub compliance_score: f64,
    pub overall_compliance: bool,
    pub trend: Trend,
    pub incidents: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub average_compliance_score: f64,
    pub targets_compliant: u32,
    pub targets_total: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaReport {
    pub id: String,
    pub nest_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub summary: ReportSummary,
    pub per_target: Vec<TargetPerformance>,
    pub generated_at: DateTime<Utc>,
}

/// Aggregate a set of measurements over one report window into a
/// structured report. `previous_scores` maps `sla_target_id` to the prior
/// window's compliance score, when known, for trend classification.
/// `incidents` maps `sla_target_id` to the count of non-compliant windows
/// observed for it in the reporting period.
pub fn generate_report(
    id: String,
    nest_id: String,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    measurements: &[SlaMeasurement],
    previous_scores: &std::collections::HashMap<String, f64>,
    incidents: &std::collections::HashMap<String, u32>,
) -> SlaReport {
    let per_target: Vec<TargetPerformance> = measurements
        .iter()
        .map(|m| TargetPerformance {
            sla_target_id: m.sla_target_id.clone(),
            service_id: m.service_id.clone(),
            compliance_score: m.compliance_score,
            overall_compliance: m.overall_compliance,
            trend: classify_trend(m.compliance_score, previous_scores.get(&m.sla_target_id).copied()),
            incidents: incidents.get(&m.sla_target_id).copied().unwrap_or(0),
        })
        .collect();

    let targets_total = per_target.len() as u32;
    let targets_compliant = per_target.iter().filter(|t| t.overall_compliance).count() as u32;
    let average_compliance_score = if per_target.is_empty() {
        0.0
    } else {
        per_target.iter().map(|t| t.compliance_score).sum::<f64>() / per_target.len() as f64
    };

    SlaReport {
        id,
        nest_id,
        window_start,
        window_end,
        summary: ReportSummary {
            average_compliance_score,
            targets_compliant,
            targets_total,
        },
        per_target,
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_improving_requires_at_least_10_percent_gain() {
        assert_eq!(classify_trend(88.0, Some(80.0)), Trend::Improving);
        assert_eq!(classify_trend(82.0, Some(80.0)), Trend::Stable);
    }

    #[test]
    fn trend_degrading_requires_at_least_10_percent_loss() {
        assert_eq!(classify_trend(70.0, Some(80.0)), Trend::Degrading);
    }

    #[test]
    fn trend_with_no_prior_window_is_stable() {
        assert_eq!(classify_trend(95.0, None), Trend::Stable);
    }
}
