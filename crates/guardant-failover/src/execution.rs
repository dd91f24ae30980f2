//! Execution strategies: immediate, gradual, and blue/green cutover
//! against the `TrafficRouter` collaborator (spec §4.5 "Execution
//! strategies").

use crate::error::{FailoverError, FailoverResult};
use guardant_proto::{FailoverStrategy, FailoverStrategyKind, TrafficRouter};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const GRADUAL_STEPS: u32 = 5;
const STEP_PERCENTAGE: f64 = 100.0 / GRADUAL_STEPS as f64;

pub struct FailoverExecutor {
    router: Arc<dyn TrafficRouter>,
}

impl FailoverExecutor {
    pub fn new(router: Arc<dyn TrafficRouter>) -> Self {
        Self { router }
    }

    /// Drive one cutover from `source` to `target` per `strategy`. Returns
    /// once the strategy's full shift has been issued to the router.
    pub async fn execute(&self, strategy: &FailoverStrategy, source: &str, target: &str) -> FailoverResult<()> {
        match strategy.kind {
            FailoverStrategyKind::Immediate => self.immediate(source, target).await,
            FailoverStrategyKind::Gradual => self.gradual(source, target, strategy.drain_timeout).await,
            FailoverStrategyKind::BlueGreen => self.blue_green(source, target, strategy.validate_target).await,
        }
    }

    async fn immediate(&self, source: &str, target: &str) -> FailoverResult<()> {
        self.router.redirect_all(source, target).await.map_err(FailoverError::Router)
    }

    /// Splits `drain_timeout` into 5 equal steps, shifting 20% of traffic
    /// per step (spec §4.5).
    async fn gradual(&self, source: &str, target: &str, drain_timeout_secs: u64) -> FailoverResult<()> {
        let step_delay = Duration::from_secs(drain_timeout_secs.max(GRADUAL_STEPS as u64)) / GRADUAL_STEPS;
        for step in 1..=GRADUAL_STEPS {
            let pct = (step as f64 * STEP_PERCENTAGE).min(100.0);
            self.router.redirect_percentage(source, target, pct).await.map_err(FailoverError::Router)?;
            info!(source, target, pct, "gradual drain step complete");
            if step < GRADUAL_STEPS {
                tokio::time::sleep(step_delay).await;
            }
        }
        Ok(())
    }

    async fn blue_green(&self, source: &str, target: &str, validate_target: bool) -> FailoverResult<()> {
        if validate_target && !self.router.validate_ready(target).await {
            return Err(FailoverError::NoTargetAvailable(target.to_string()));
        }
        self.router.redirect_all(source, target).await.map_err(FailoverError::Router)
    }
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
        ready: bool,
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
            self.ready
        }
    }

    #[tokio::test]
    async fn immediate_issues_one_full_redirect() {
        let router = Arc::new(RecordingRouter::default());
        let executor = FailoverExecutor::new(router.clone());
        let strategy = FailoverStrategy { kind: FailoverStrategyKind::Immediate, drain_timeout: 60, validate_target: true };
        executor.execute(&strategy, "ep-1", "ep-2").await.unwrap();
        assert_eq!(router.redirect_all_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gradual_issues_five_equal_steps() {
        let router = Arc::new(RecordingRouter::default());
        let executor = FailoverExecutor::new(router.clone());
        let strategy = FailoverStrategy { kind: FailoverStrategyKind::Gradual, drain_timeout: 5, validate_target: true };
        executor.execute(&strategy, "ep-1", "ep-2").await.unwrap();
        let percentages = router.percentages.lock().await.clone();
        assert_eq!(percentages, vec![20.0, 40.0, 60.0, 80.0, 100.0]);
    }

    #[tokio::test]
    async fn blue_green_rejects_unready_target() {
        let router = Arc::new(RecordingRouter { ready: false, ..Default::default() });
        let executor = FailoverExecutor::new(router.clone());
        let strategy = FailoverStrategy { kind: FailoverStrategyKind::BlueGreen, drain_timeout: 60, validate_target: true };
        let result = executor.execute(&strategy, "ep-1", "ep-2").await;
        assert!(result.is_err());
        assert_eq!(router.redirect_all_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blue_green_skips_validation_when_disabled() {
        let router = Arc::new(RecordingRouter { ready: false, ..Default::default() });
        let executor = FailoverExecutor::new(router.clone());
        let strategy = FailoverStrategy { kind: FailoverStrategyKind::BlueGreen, drain_timeout: 60, validate_target: false };
        executor.execute(&strategy, "ep-1", "ep-2").await.unwrap();
        assert_eq!(router.redirect_all_calls.load(Ordering::SeqCst), 1);
    }
}
