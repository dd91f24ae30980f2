//! Windowed measurement derivation from probe history (spec §4.6).
//!
//! Resolves the Open Question in spec §9 ("SLA measurement code in the
//! source is a mock... the spec prescribes the aggregation semantics"):
//! the four metrics are derived directly from stored [`ProbeResult`]s, not
//! mocked.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use guardant_proto::{
    AppliedPenalty, CreditTier, DataGap, DataQuality, EarnedCredit, MetricOutcome, PenaltyTier, ProbeResult,
    ProbeStatus, SlaMeasurement, SlaTarget,
};

/// Everything needed to turn a window of probe results into one
/// [`SlaMeasurement`]. `expected_interval` is the monitored service's
/// configured probe interval, used for data-quality gap detection and
/// completeness.
pub struct MeasurementInput<'a> {
    pub target: &'a SlaTarget,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub results: Vec<ProbeResult>,
    pub expected_interval: std::time::Duration,
    pub scheduled_downtime_minutes: i64,
}

/// Nearest-rank percentile over a sorted slice (spec §4.6: "percentile `p`
/// ... across all `up` results' `responseTime`").
fn percentile_nearest_rank(mut values: Vec<u64>, p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable();
    let rank = ((p / 100.0) * values.len() as f64).ceil().max(1.0) as usize;
    let idx = rank.min(values.len()) - 1;
    values[idx] as f64
}

fn detect_gaps(timestamps: &[DateTime<Utc>], nominal: std::time::Duration) -> Vec<DataGap> {
    let threshold = ChronoDuration::from_std(nominal * 3).unwrap_or(ChronoDuration::seconds(180));
    let mut gaps = Vec::new();
    for pair in timestamps.windows(2) {
        let [a, b] = pair else { continue };
        if *b - *a > threshold {
            gaps.push(DataGap { start: *a, end: *b });
        }
    }
    gaps
}

fn apply_penalty(table: &[PenaltyTier], metric: &str, actual: f64, lower_is_worse: bool) -> Option<AppliedPenalty> {
    table
        .iter()
        .filter(|t| t.metric == metric)
        .find(|t| if lower_is_worse { actual < t.threshold } else { actual > t.threshold })
        .map(|t| AppliedPenalty {
            metric: metric.to_string(),
            threshold: t.threshold,
            penalty_pct: t.penalty_pct,
        })
}

fn apply_credit(table: &[CreditTier], metric: &str, actual: f64, lower_is_worse: bool) -> Option<EarnedCredit> {
    table
        .iter()
        .filter(|t| t.metric == metric)
        .find(|t| if lower_is_worse { actual > t.threshold } else { actual < t.threshold })
        .map(|t| EarnedCredit {
            metric: metric.to_string(),
            threshold: t.threshold,
            credit_pct: t.credit_pct,
        })
}

/// Compute the four-metric measurement for one window, per spec §4.6
/// steps 1-6. `unknown` samples (network-isolation / unknown-type probes)
/// are excluded from every denominator — they never count as failure.
pub fn compute_measurement(id: String, nest_id: String, input: MeasurementInput<'_>) -> SlaMeasurement {
    let MeasurementInput {
        target,
        window_start,
        window_end,
        mut results,
        expected_interval,
        scheduled_downtime_minutes,
    } = input;

    results.sort_by_key(|r| r.timestamp);
    let counted: Vec<&ProbeResult> = results.iter().filter(|r| r.status != ProbeStatus::Unknown).collect();
    let up_count = counted.iter().filter(|r| r.status == ProbeStatus::Up).count();
    let down_count = counted.iter().filter(|r| r.status == ProbeStatus::Down).count();
    let counted_total = up_count + down_count;

    let window_minutes = ((window_end - window_start).num_minutes()).max(0);
    let denom_minutes = if target.exclude_scheduled_maintenance {
        (window_minutes - scheduled_downtime_minutes).max(1)
    } else {
        window_minutes.max(1)
    };

    let uptime_actual = (up_count as f64 / denom_minutes as f64) * 100.0;
    let uptime = MetricOutcome {
        actual: uptime_actual,
        target: target.uptime.target,
        compliant: uptime_actual >= target.uptime.target,
    };

    let up_response_times: Vec<u64> = counted
        .iter()
        .filter(|r| r.status == ProbeStatus::Up)
        .filter_map(|r| r.response_time)
        .collect();
    let rt_actual = percentile_nearest_rank(up_response_times, target.response_time.percentile);
    let response_time = MetricOutcome {
        actual: rt_actual,
        target: target.response_time.target_ms,
        compliant: rt_actual <= target.response_time.target_ms,
    };

    let error_rate_actual = if counted_total > 0 {
        (down_count as f64 / counted_total as f64) * 100.0
    } else {
        0.0
    };
    let error_rate = MetricOutcome {
        actual: error_rate_actual,
        target: target.error_rate.target,
        compliant: error_rate_actual <= target.error_rate.target,
    };

    let availability_actual = if counted_total > 0 {
        (up_count as f64 / counted_total as f64) * 100.0
    } else {
        0.0
    };
    let availability = MetricOutcome {
        actual: availability_actual,
        target: target.availability.target,
        compliant: availability_actual >= target.availability.target,
    };

    let overall_compliance = uptime.compliant && response_time.compliant && error_rate.compliant && availability.compliant;
    let compliant_count = [uptime.compliant, response_time.compliant, error_rate.compliant, availability.compliant]
        .iter()
        .filter(|c| **c)
        .count();
    let compliance_score = 100.0 * compliant_count as f64 / 4.0;

    let mut applied_penalties = Vec::new();
    let mut earned_credits = Vec::new();
    for (metric, actual, lower_is_worse) in [
        ("uptime", uptime.actual, true),
        ("availability", availability.actual, true),
        ("response_time", response_time.actual, false),
        ("error_rate", error_rate.actual, false),
    ] {
        if let Some(p) = apply_penalty(&target.penalty_table, metric, actual, lower_is_worse) {
            applied_penalties.push(p);
        }
        if let Some(c) = apply_credit(&target.credit_table, metric, actual, lower_is_worse) {
            earned_credits.push(c);
        }
    }

    let timestamps: Vec<DateTime<Utc>> = results.iter().map(|r| r.timestamp).collect();
    let gaps = detect_gaps(&timestamps, expected_interval);
    let expected_samples = if expected_interval.as_secs() > 0 {
        ((window_end - window_start).num_seconds() as f64 / expected_interval.as_secs() as f64).max(1.0)
    } else {
        1.0
    };
    let completeness = (results.len() as f64 / expected_samples).min(1.0);

    SlaMeasurement {
        id,
        sla_target_id: target.id.clone(),
        nest_id,
        service_id: target.service_id.clone(),
        window_start,
        window_end,
        uptime,
        response_time,
        error_rate,
        availability,
        overall_compliance,
        compliance_score,
        applied_penalties,
        earned_credits,
        data_quality: DataQuality { completeness, gaps },
        computed_at: Utc::now(),
    }
}
