//! External collaborator interfaces (spec §6). These are the contracts
//! the core depends on but never implements itself — notification
//! delivery, report file rendering. Concrete adapters (email/Slack/
//! PagerDuty senders, a PDF renderer) live outside the core's scope and
//! are injected at composition time.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Slack,
    Webhook,
    Pagerduty,
}

/// A delivery sink for domain events raised by the Failover Controller
/// and SLA Manager. Failure to deliver must never roll back the
/// originating domain event (spec §6).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, channel: NotificationChannel, payload: Value);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
    Csv,
    Json,
    Excel,
}

/// Renders a structured SLA report into a downloadable artifact. The core
/// only emits the structured report; rendering is always delegated here.
#[async_trait]
pub trait FileGenerator: Send + Sync {
    async fn generate(&self, report: &Value, format: ReportFormat) -> String;
}

/// A no-op sink used by tests and by composition roots that haven't wired
/// a real delivery channel yet.
pub struct NullNotificationSink;

#[async_trait]
impl NotificationSink for NullNotificationSink {
    async fn send(&self, _channel: NotificationChannel, _payload: Value) {}
}

/// A no-op generator returning a deterministic placeholder url, used the
/// same way.
pub struct NullFileGenerator;

#[async_trait]
impl FileGenerator for NullFileGenerator {
    async fn generate(&self, _report: &Value, format: ReportFormat) -> String {
        format!("null://report.{format:?}", format = format).to_lowercase()
    }
}

/// The traffic-shifting adapter the Failover Controller drives (spec §6).
/// `source`/`target` are endpoint ids. Implementations own whatever load
/// balancer, DNS, or service-mesh API actually moves traffic; the core
/// only ever calls through this trait.
#[async_trait]
pub trait TrafficRouter: Send + Sync {
    /// Move all traffic from `source` to `target`. Idempotent: calling it
    /// again with the same arguments while already fully redirected must
    /// not error.
    async fn redirect_all(&self, source: &str, target: &str) -> Result<(), String>;

    /// Move `percentage` of `source`'s traffic to `target`, `0..=100`.
    /// Used by the gradual and blue/green strategies to ramp up.
    async fn redirect_percentage(&self, source: &str, target: &str, percentage: f64) -> Result<(), String>;

    /// Probe `target` well enough to say whether it can safely receive
    /// traffic before any redirect is issued against it.
    async fn validate_ready(&self, target: &str) -> bool;
}

/// A no-op router for tests and composition roots without a real traffic
/// plane wired up yet. Reports every target ready and accepts every
/// redirect.
pub struct NullTrafficRouter;

#[async_trait]
impl TrafficRouter for NullTrafficRouter {
    async fn redirect_all(&self, _source: &str, _target: &str) -> Result<(), String> {
        Ok(())
    }

    async fn redirect_percentage(&self, _source: &str, _target: &str, _percentage: f64) -> Result<(), String> {
        Ok(())
    }

    async fn validate_ready(&self, _target: &str) -> bool {
        true
    }
}
