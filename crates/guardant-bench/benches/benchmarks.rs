//! GuardAnt performance benchmarks using Criterion.
//!
//! Run with: `cargo bench -p guardant-bench`

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use guardant_failover::HealthSample;
use guardant_jobs::{Job, Priority, RetryConfig};
use guardant_metrics::RingBuffer;
use guardant_probes::ProbeRegistry;
use guardant_proto::{EndpointStatus, HeartbeatConfig, ServiceType, ServiceTypeConfig};
use std::collections::VecDeque;
use std::time::Duration;

// ─── bench_probe_dispatch ─────────────────────────────────────────────────────

/// Resolve-and-run a zero-I/O probe (heartbeat) through the registry.
///
/// This is the per-tick cost the probe engine pays to go from
/// `ServiceType` to a `ProbeOutcome`, independent of any network latency.
fn bench_probe_dispatch(c: &mut Criterion) {
    let registry = ProbeRegistry::standard();
    let probe = registry.get(ServiceType::Heartbeat).expect("heartbeat registered");
    let config = ServiceTypeConfig {
        heartbeat_config: Some(HeartbeatConfig {
            expected_interval: 60,
            tolerance: 10,
            last_heartbeat: Some(Utc::now()),
        }),
        ..Default::default()
    };
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("probe_dispatch_heartbeat", |b| {
        b.iter(|| {
            rt.block_on(async {
                let outcome = probe.check(black_box("heartbeat-target"), black_box(&config), Duration::from_secs(10)).await;
                black_box(outcome.status)
            })
        });
    });
}

// ─── bench_ring_buffer_push ────────────────────────────────────────────────────

/// Push throughput of the per-endpoint health ring buffer at its
/// production capacity (spec §4.5: single-writer, capacity-bounded).
fn bench_ring_buffer_push(c: &mut Criterion) {
    let buffer: RingBuffer<HealthSample> = RingBuffer::new(600);
    let now = Utc::now();

    c.bench_function("ring_buffer_push", |b| {
        b.iter(|| {
            buffer.push(black_box(HealthSample {
                timestamp: now,
                healthy: true,
                response_time_ms: Some(42),
                status: EndpointStatus::Healthy,
            }));
        });
    });
}

/// Windowed read over a full 600-sample buffer — the query the rule
/// evaluator runs every `detectionInterval` tick per endpoint.
fn bench_ring_buffer_within_window(c: &mut Criterion) {
    let buffer: RingBuffer<HealthSample> = RingBuffer::new(600);
    let base: DateTime<Utc> = Utc::now() - ChronoDuration::seconds(600);
    for i in 0..600 {
        buffer.push(HealthSample {
            timestamp: base + ChronoDuration::seconds(i),
            healthy: i % 10 != 0,
            response_time_ms: Some(50 + (i as u64 % 20)),
            status: EndpointStatus::Healthy,
        });
    }

    c.bench_function("ring_buffer_within_window_60s", |b| {
        b.iter(|| {
            let samples = buffer.within_window(black_box(Utc::now()), black_box(Duration::from_secs(60)));
            black_box(samples.len())
        });
    });
}

// ─── bench_job_queue_drain ─────────────────────────────────────────────────────

/// Push 1000 jobs then drain them FIFO — the oldest-first-within-a-queue
/// discipline a `JobQueue` enforces on top of its `VecDeque<Job>` (spec
/// §4.4 / §5).
fn bench_job_queue_drain(c: &mut Criterion) {
    c.bench_function("job_queue_push_and_drain_1000", |b| {
        b.iter(|| {
            let mut queue: VecDeque<Job> = VecDeque::with_capacity(1000);
            for i in 0..1000 {
                queue.push_back(Job::new(format!("bench-job-{i}"), Priority::Normal, serde_json::json!({ "i": i })));
            }
            let mut drained = 0usize;
            while let Some(job) = queue.pop_front() {
                black_box(job.id.len());
                drained += 1;
            }
            black_box(drained)
        });
    });
}

// ─── bench_retry_delay ─────────────────────────────────────────────────────────

/// Retry-delay computation cost — called once per failed attempt, must
/// stay near-zero so it never competes with the actual retry sleep.
fn bench_retry_delay(c: &mut Criterion) {
    let config = RetryConfig::default();

    c.bench_function("retry_delay_for_attempt", |b| {
        let mut n: u32 = 1;
        b.iter(|| {
            let delay = config.delay_for_attempt(black_box(n));
            n = (n % 6) + 1;
            black_box(delay)
        });
    });
}

// ─── bench_sla_percentile ──────────────────────────────────────────────────────

/// Nearest-rank percentile computation over a month of one-per-minute
/// response-time samples — the dominant cost of one SLA measurement.
fn bench_sla_percentile(c: &mut Criterion) {
    use guardant_proto::ProbeStatus;
    use guardant_sla::compute_measurement;

    let target = guardant_proto::SlaTarget {
        id: "sla_bench".to_string(),
        nest_id: "nest-bench".to_string(),
        service_id: Some("svc-bench".to_string()),
        uptime: guardant_proto::MetricTarget { target: 99.9 },
        response_time: guardant_proto::ResponseTimeTarget { target_ms: 500.0, percentile: 95.0 },
        error_rate: guardant_proto::MetricTarget { target: 1.0 },
        availability: guardant_proto::MetricTarget { target: 99.9 },
        window: guardant_proto::MeasurementWindow::Monthly,
        penalty_table: vec![],
        credit_table: vec![],
        reporting_frequency: guardant_proto::ReportFrequency::Monthly,
        stakeholders: vec![],
        exclude_scheduled_maintenance: false,
        active: true,
        version: 1,
    };
    let start = Utc::now() - ChronoDuration::days(30);
    let end = Utc::now();
    let results: Vec<guardant_proto::ProbeResult> = (0..43_200)
        .map(|i| guardant_proto::ProbeResult {
            service_id: "svc-bench".to_string(),
            nest_id: "nest-bench".to_string(),
            status: if i % 400 == 0 { ProbeStatus::Down } else { ProbeStatus::Up },
            message: String::new(),
            response_time: Some(80 + (i as u64 % 120)),
            timestamp: start + ChronoDuration::minutes(i),
            check_duration: 10,
            attempt: 1,
            metadata: None,
        })
        .collect();

    c.bench_function("sla_measurement_43200_samples", |b| {
        b.iter(|| {
            let measurement = compute_measurement(
                "meas_bench".to_string(),
                "nest-bench".to_string(),
                guardant_sla::MeasurementInput {
                    target: &target,
                    window_start: start,
                    window_end: end,
                    results: results.clone(),
                    expected_interval: Duration::from_secs(60),
                    scheduled_downtime_minutes: 0,
                },
            );
            black_box(measurement.compliance_score)
        });
    });
}

criterion_group!(
    benches,
    bench_probe_dispatch,
    bench_ring_buffer_push,
    bench_ring_buffer_within_window,
    bench_job_queue_drain,
    bench_retry_delay,
    bench_sla_percentile,
);
criterion_main!(benches);
