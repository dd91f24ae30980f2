//! Recovery monitoring: consecutive-success-gated ramp-up back to the
//! original source (spec §4.5 "Recovery monitoring").

use crate::execution::FailoverExecutor;
use guardant_proto::{RecoveryKind, RecoveryStrategy, TrafficRouter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const WALL_CLOCK_LIMIT: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Traffic has been fully ramped back to `source`.
    Recovered,
    /// The 24h wall-clock limit elapsed before recovery completed.
    TimedOut,
}

/// Drives one source endpoint's recovery, health-checking it with
/// `probe` until `consecutive_success_required` successes in a row, then
/// ramping traffic back per `strategy`. Any failure resets the streak.
/// Returns once the monitor closes, one way or another.
pub async fn run(
    strategy: &RecoveryStrategy,
    source: &str,
    target: &str,
    executor: &FailoverExecutor,
    router: &Arc<dyn TrafficRouter>,
    mut probe: impl FnMut() -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send>>,
    health_check_interval: Duration,
) -> RecoveryOutcome {
    if strategy.kind != RecoveryKind::Automatic {
        return RecoveryOutcome::Recovered;
    }

    let started = Instant::now();
    let mut consecutive = 0u32;
    loop {
        if started.elapsed() > WALL_CLOCK_LIMIT {
            warn!(source, "recovery monitor closed by 24h wall-clock limit");
            return RecoveryOutcome::TimedOut;
        }

        tokio::time::sleep(health_check_interval).await;
        if started.elapsed() > WALL_CLOCK_LIMIT {
            return RecoveryOutcome::TimedOut;
        }

        if probe().await {
            consecutive += 1;
        } else {
            consecutive = 0;
        }

        if consecutive >= strategy.consecutive_success_required {
            break;
        }
    }

    tokio::time::sleep(Duration::from_secs(strategy.recovery_delay_secs)).await;
    ramp_back(strategy, source, target, executor, router).await;
    RecoveryOutcome::Recovered
}

/// Ramps traffic from `initialPercentage` to 100%, stepping
/// `incrementPercentage` every `incrementInterval`, using
/// `redirectPercentage(target, source, pct)` — the inverse direction of
/// the original cutover.
async fn ramp_back(strategy: &RecoveryStrategy, source: &str, target: &str, _executor: &FailoverExecutor, router: &Arc<dyn TrafficRouter>) {
    let mut pct = strategy.initial_percentage as f64;
    loop {
        if (router.redirect_percentage(target, source, pct).await).is_err() {
            warn!(source, target, pct, "ramp-back step rejected by traffic router");
        }
        info!(source, target, pct, "recovery ramp-back step complete");
        if pct >= 100.0 {
            break;
        }
        tokio::time::sleep(Duration::from_secs(strategy.increment_interval_secs)).await;
        pct = (pct + strategy.increment_percentage as f64).min(100.0);
    }
    let _ = router.redirect_all(target, source).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingRouter {
        percentages: Mutex<Vec<f64>>,
        redirect_all_calls: AtomicUsize,
    }

    #[async_trait]
    impl TrafficRouter for RecordingRouter {
        async fn redirect_all(&self, _source: &str, _target: &str) -> Result<(), String> {
            self.redirect_all_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn redirect_percentage(&self, _source: &str, _target: &str, percentage: f64) -> Result<(), String> {
            self.percentages.lock().await.push(percentage);
            Ok(())
        }
        async fn validate_ready(&self, _target: &str) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn consecutive_successes_required_before_ramp_back() {
        let router: Arc<dyn TrafficRouter> = Arc::new(RecordingRouter::default());
        let executor = FailoverExecutor::new(router.clone());
        let strategy = RecoveryStrategy {
            kind: RecoveryKind::Automatic,
            consecutive_success_required: 2,
            recovery_delay_secs: 0,
            initial_percentage: 50,
            increment_percentage: 50,
            increment_interval_secs: 0,
        };

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let outcome = run(
            &strategy,
            "ep-source",
            "ep-target",
            &executor,
            &router,
            move || {
                let n = calls_clone.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move { n >= 1 })
            },
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(outcome, RecoveryOutcome::Recovered);
    }

    #[tokio::test]
    async fn manual_recovery_never_runs_the_monitor() {
        let router: Arc<dyn TrafficRouter> = Arc::new(RecordingRouter::default());
        let executor = FailoverExecutor::new(router.clone());
        let strategy = RecoveryStrategy { kind: RecoveryKind::Manual, ..RecoveryStrategy::default() };
        let outcome = run(&strategy, "ep-source", "ep-target", &executor, &router, || Box::pin(async { true }), Duration::from_secs(1)).await;
        assert_eq!(outcome, RecoveryOutcome::Recovered);
    }
}
