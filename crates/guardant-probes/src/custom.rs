//! Custom external monitoring API check (spec §4.2 "Custom external
//! monitoring API"). `target` is `"custom:<base64-json>"` carrying
//! `{url, fields[]}`; each field path is walked with dot/bracket notation
//! and classified as a down signal.

use crate::registry::{Probe, ProbeOutcome};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use guardant_proto::ServiceTypeConfig;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};

pub struct CustomApiProbe {
    client: Client,
}

impl Default for CustomApiProbe {
    fn default() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct CustomTarget {
    url: String,
    fields: Vec<String>,
}

fn parse_target(target: &str) -> Result<CustomTarget, String> {
    let encoded = target
        .strip_prefix("custom:")
        .ok_or_else(|| "target must start with 'custom:'".to_string())?;
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|e| format!("invalid base64: {e}"))?;
    serde_json::from_slice(&decoded).map_err(|e| format!("invalid target JSON: {e}"))
}

/// Walk a dot/bracket path like `data.services[0].status` against a JSON value.
fn walk_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for raw_segment in path.split('.') {
        let (name, indices) = split_indices(raw_segment);
        if !name.is_empty() {
            current = current.get(name)?;
        }
        for idx in indices {
            current = current.get(idx)?;
        }
    }
    Some(current)
}

/// Split `foo[0][1]` into `("foo", [0, 1])`.
fn split_indices(segment: &str) -> (&str, Vec<usize>) {
    let mut indices = Vec::new();
    let name_end = segment.find('[').unwrap_or(segment.len());
    let name = &segment[..name_end];
    let mut rest = &segment[name_end..];
    while let Some(open) = rest.find('[') {
        if let Some(close) = rest[open..].find(']') {
            if let Ok(idx) = rest[open + 1..open + close].parse::<usize>() {
                indices.push(idx);
            }
            rest = &rest[open + close + 1..];
        } else {
            break;
        }
    }
    (name, indices)
}

fn is_down_signal(path: &str, value: &Value) -> bool {
    let lower = path.to_lowercase();
    match value {
        Value::Bool(b) => !b,
        Value::Number(n) => n
            .as_f64()
            .map(|f| if lower.contains("availability") { f < 90.0 } else { f == 0.0 })
            .unwrap_or(false),
        Value::String(s) => {
            if lower.contains("status") {
                !s.eq_ignore_ascii_case("up")
            } else {
                s.eq_ignore_ascii_case("down")
            }
        }
        _ => false,
    }
}

#[async_trait]
impl Probe for CustomApiProbe {
    async fn check(&self, target: &str, _config: &ServiceTypeConfig, deadline: Duration) -> ProbeOutcome {
        let spec = match parse_target(target) {
            Ok(s) => s,
            Err(e) => return ProbeOutcome::down(format!("Invalid custom target: {e}")),
        };
        let start = Instant::now();

        let resp = match tokio::time::timeout(deadline, self.client.get(&spec.url).send()).await {
            Err(_) => return crate::timeout_outcome(),
            Ok(Err(e)) => return ProbeOutcome::down(format!("Request failed: {e}")),
            Ok(Ok(r)) => r,
        };
        let remaining = deadline.saturating_sub(start.elapsed());
        let body: Value = match tokio::time::timeout(remaining, resp.json()).await {
            Err(_) => return crate::timeout_outcome(),
            Ok(Err(e)) => return ProbeOutcome::down(format!("Malformed JSON response: {e}")),
            Ok(Ok(v)) => v,
        };

        let mut down_fields = Vec::new();
        for field in &spec.fields {
            match walk_path(&body, field) {
                Some(value) if is_down_signal(field, value) => down_fields.push(field.clone()),
                Some(_) => {}
                None => down_fields.push(format!("{field} (missing)")),
            }
        }

        let rt = crate::elapsed_ms(start);
        if down_fields.is_empty() {
            ProbeOutcome::up(format!("All {} fields nominal", spec.fields.len()), Some(rt))
        } else {
            ProbeOutcome::down(format!("Down signal from field(s): {}", down_fields.join(", ")))
        }
    }
}
