//! Rule evaluation: regex service-pattern matching, cooldown and rate
//! limiting, and AND-semantics trigger conditions (spec §4.5 "Rule
//! evaluation").

use crate::health::EndpointMetrics;
use chrono::{DateTime, Utc};
use guardant_proto::{EvaluatedCondition, FailoverEvent, FailoverEventStatus, FailoverRule, ServiceEndpoint};
use regex::Regex;
use std::collections::HashSet;

/// A rule that fired for one source endpoint this tick, with the
/// evaluated conditions recorded for the resulting [`FailoverEvent`].
pub struct Triggered<'a> {
    pub rule: &'a FailoverRule,
    pub source: &'a ServiceEndpoint,
    pub conditions: Vec<EvaluatedCondition>,
}

fn metric_value(metrics: &EndpointMetrics, name: &str) -> Option<f64> {
    match name {
        "response_time" => Some(metrics.response_time),
        "error_rate" => Some(metrics.error_rate),
        "availability" => Some(metrics.availability),
        _ => None,
    }
}

fn in_cooldown(rule: &FailoverRule, endpoint_id: &str, now: DateTime<Utc>, history: &[FailoverEvent]) -> bool {
    let cooldown = chrono::Duration::seconds(rule.cooldown_period_secs as i64);
    history
        .iter()
        .filter(|e| e.source_endpoint == endpoint_id)
        .filter(|e| matches!(e.status, FailoverEventStatus::Completed | FailoverEventStatus::Recovered))
        .any(|e| now - e.timestamp < cooldown)
}

fn rate_limited(rule: &FailoverRule, endpoint_id: &str, now: DateTime<Utc>, history: &[FailoverEvent]) -> bool {
    if rule.max_failovers == 0 {
        return false;
    }
    let window = chrono::Duration::seconds(rule.time_window_secs as i64);
    let count = history
        .iter()
        .filter(|e| e.rule_id == rule.id && e.source_endpoint == endpoint_id)
        .filter(|e| now - e.timestamp < window)
        .count();
    count as u32 >= rule.max_failovers
}

/// Evaluates every enabled rule, in descending `priority` then insertion
/// order (spec §5), against every endpoint's freshly derived metrics.
/// `active_sources` holds source endpoints with a non-terminal
/// `FailoverEvent`; rules never re-trigger those (the re-entrancy guard
/// lives here as well as in the controller, since a source already
/// mid-failover should never even be considered).
pub fn evaluate_tick<'a>(
    rules: &'a [FailoverRule],
    endpoints: &'a [ServiceEndpoint],
    metrics_fn: impl Fn(&str) -> EndpointMetrics,
    history: &[FailoverEvent],
    active_sources: &HashSet<String>,
    active_count: usize,
    max_concurrent_failovers: usize,
) -> Vec<Triggered<'a>> {
    let now = Utc::now();
    let mut ordered: Vec<&FailoverRule> = rules.iter().filter(|r| r.enabled).collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut triggered = Vec::new();
    let mut in_flight_budget = max_concurrent_failovers.saturating_sub(active_count);

    for rule in ordered {
        if in_flight_budget == 0 {
            break;
        }
        let Ok(pattern) = Regex::new(&rule.service_pattern) else { continue };

        for endpoint in endpoints {
            if in_flight_budget == 0 {
                break;
            }
            if active_sources.contains(&endpoint.id) || !pattern.is_match(&endpoint.name) {
                continue;
            }
            if in_cooldown(rule, &endpoint.id, now, history) || rate_limited(rule, &endpoint.id, now, history) {
                continue;
            }

            let metrics = metrics_fn(&endpoint.id);
            let conditions: Vec<EvaluatedCondition> = rule
                .trigger_conditions
                .iter()
                .filter_map(|c| {
                    let observed = metric_value(&metrics, &c.metric)?;
                    Some(EvaluatedCondition {
                        metric: c.metric.clone(),
                        operator: c.operator,
                        threshold: c.threshold,
                        observed,
                        passed: c.operator.apply(observed, c.threshold),
                    })
                })
                .collect();

            let all_pass = !conditions.is_empty() && conditions.iter().all(|c| c.passed);
            if all_pass {
                triggered.push(Triggered { rule, source: endpoint, conditions });
                in_flight_budget -= 1;
            }
        }
    }

    triggered
}
