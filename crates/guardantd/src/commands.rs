//! One-shot command dispatch for `guardantd exec <command> --params <json>`.
//!
//! Mirrors the teacher's `command -> JSON` dispatch shape (one match arm
//! per dotted command name, each handler taking the shared system state
//! and returning a JSON value) generalized from VPS fleet commands to
//! GuardAnt's own domain operations.

use crate::error::{GuardantdError, GuardantdResult};
use crate::system::System;
use chrono::Utc;
use guardant_proto::{gen_id, ids, NestService, ProbeStatus, ServiceEndpoint, ServiceTypeConfig};
use serde_json::{json, Value};

pub async fn handle_command(system: &System, command: &str, params: Value) -> GuardantdResult<Value> {
    match command {
        "service.register" => service_register(system, params).await,
        "service.check" => service_check(system, params).await,
        "endpoint.register" => endpoint_register(system, params).await,
        "endpoint.get" => endpoint_get(system, params).await,
        "rule.register" => rule_register(system, params).await,
        "failover.trigger" => failover_trigger(system, params).await,
        "failover.get" => failover_get(system, params).await,
        "failover.active" => failover_active(system).await,
        "sla.create_target" => sla_create_target(system, params).await,
        "sla.compute" => sla_compute(system, params).await,
        "metrics.render" => metrics_render(system).await,
        other => Err(GuardantdError::UnknownCommand(other.to_string())),
    }
}

fn field<'a>(params: &'a Value, name: &str) -> GuardantdResult<&'a Value> {
    params
        .get(name)
        .ok_or_else(|| GuardantdError::InvalidParams(format!("missing field `{name}`")))
}

fn str_field(params: &Value, name: &str) -> GuardantdResult<String> {
    field(params, name)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| GuardantdError::InvalidParams(format!("field `{name}` must be a string")))
}

async fn service_register(system: &System, params: Value) -> GuardantdResult<Value> {
    let nest_id = str_field(&params, "nestId")?;
    let service_type = serde_json::from_value(field(&params, "type")?.clone())?;
    let target = str_field(&params, "target")?;
    let interval = field(&params, "interval")?
        .as_u64()
        .ok_or_else(|| GuardantdError::InvalidParams("field `interval` must be a positive integer".into()))?;
    let config: ServiceTypeConfig = params
        .get("config")
        .cloned()
        .map(serde_json::from_value)
        .transpose()?
        .unwrap_or_default();

    let now = Utc::now();
    let service = NestService {
        id: gen_id(ids::SERVICE_PREFIX),
        nest_id,
        name: params.get("name").and_then(Value::as_str).unwrap_or("service").to_string(),
        order: None,
        tags: vec![],
        alerting_enabled: true,
        service_type,
        target,
        interval,
        config,
        last_status: ProbeStatus::Unknown,
        last_check: None,
        message: None,
        response_time: None,
        retry_count: 0,
        created_at: now,
        updated_at: now,
    };

    system.probe_engine.register_service(service.clone()).await?;
    Ok(json!({ "id": service.id, "nestId": service.nest_id }))
}

async fn service_check(system: &System, params: Value) -> GuardantdResult<Value> {
    let nest_id = str_field(&params, "nestId")?;
    let service_id = str_field(&params, "serviceId")?;
    let result = system.probe_engine.check_service(&nest_id, &service_id).await?;
    Ok(serde_json::to_value(result)?)
}

async fn endpoint_register(system: &System, params: Value) -> GuardantdResult<Value> {
    let endpoint: ServiceEndpoint = if params.get("id").is_some() {
        serde_json::from_value(params)?
    } else {
        let mut with_id = params.clone();
        with_id["id"] = json!(gen_id(ids::ENDPOINT_PREFIX));
        serde_json::from_value(with_id)?
    };
    system.failover.register_endpoint(endpoint.clone()).await?;
    Ok(json!({ "id": endpoint.id }))
}

async fn endpoint_get(system: &System, params: Value) -> GuardantdResult<Value> {
    let id = str_field(&params, "id")?;
    let endpoint = system.failover.get_endpoint(&id).await?;
    Ok(serde_json::to_value(endpoint)?)
}

async fn rule_register(system: &System, params: Value) -> GuardantdResult<Value> {
    let rule = if params.get("id").is_some() {
        serde_json::from_value(params)?
    } else {
        let mut with_id = params.clone();
        with_id["id"] = json!(gen_id(ids::RULE_PREFIX));
        serde_json::from_value(with_id)?
    };
    system.failover.register_rule(rule).await?;
    Ok(json!({ "ok": true }))
}

async fn failover_trigger(system: &System, params: Value) -> GuardantdResult<Value> {
    let source = str_field(&params, "source")?;
    let target = str_field(&params, "target")?;
    let event = system.failover.trigger_failover(&source, &target).await?;
    Ok(serde_json::to_value(event)?)
}

async fn failover_get(system: &System, params: Value) -> GuardantdResult<Value> {
    let id = str_field(&params, "id")?;
    let event = system.failover.get_event(&id).await?;
    Ok(serde_json::to_value(event)?)
}

async fn failover_active(system: &System) -> GuardantdResult<Value> {
    let active = system.failover.active_failovers().await;
    Ok(serde_json::to_value(active)?)
}

async fn sla_create_target(system: &System, params: Value) -> GuardantdResult<Value> {
    let nest_id = str_field(&params, "nestId")?;
    let target = serde_json::from_value(params)?;
    let created = system.sla_targets.create(&nest_id, target).await?;
    Ok(serde_json::to_value(created)?)
}

async fn sla_compute(system: &System, params: Value) -> GuardantdResult<Value> {
    let nest_id = str_field(&params, "nestId")?;
    let sla_target_id = str_field(&params, "slaTargetId")?;
    let start = chrono::DateTime::parse_from_rfc3339(&str_field(&params, "start")?)
        .map_err(|e| GuardantdError::InvalidParams(format!("invalid `start`: {e}")))?
        .with_timezone(&Utc);
    let end = chrono::DateTime::parse_from_rfc3339(&str_field(&params, "end")?)
        .map_err(|e| GuardantdError::InvalidParams(format!("invalid `end`: {e}")))?
        .with_timezone(&Utc);

    let target = system
        .sla_targets
        .get(&nest_id, &sla_target_id)
        .await?
        .ok_or_else(|| GuardantdError::InvalidParams(format!("no such sla target: {sla_target_id}")))?;

    let expected_interval_secs = params.get("expectedIntervalSecs").and_then(Value::as_u64).unwrap_or(60);
    let results = guardant_sla::load_results_in_window(
        system.store.as_ref(),
        &nest_id,
        target.service_id.as_deref(),
        start,
        end,
    )
    .await?;

    let measurement = guardant_sla::compute_measurement(
        guardant_sla::new_measurement_id(),
        nest_id.clone(),
        guardant_sla::MeasurementInput {
            target: &target,
            window_start: start,
            window_end: end,
            results,
            expected_interval: std::time::Duration::from_secs(expected_interval_secs),
            scheduled_downtime_minutes: params.get("scheduledDowntimeMinutes").and_then(Value::as_i64).unwrap_or(0),
        },
    );
    system.sla_measurements.save(&nest_id, &measurement).await?;
    system.metrics.record_sla_measurement();
    Ok(serde_json::to_value(measurement)?)
}

async fn metrics_render(system: &System) -> GuardantdResult<Value> {
    let exporter = guardant_observe::MetricsExporter::new(system.metrics.clone());
    Ok(json!({ "prometheus": exporter.render() }))
}
