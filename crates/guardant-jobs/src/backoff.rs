//! Retry backoff policies and the non-recoverable-error classifier
//! (spec §4.4, §9 redesign flag: "ad hoc string matching for recoverability"
//! becomes one explicit [`Recoverability`] classifier instead of scattered
//! string checks).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: BackoffKind,
    pub base_delay: Duration,
    pub max_delay: Duration,
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffKind::Exponential,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(60_000),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Delay before the given attempt (1-indexed) is retried, per spec
    /// §4.4's three formulas. `jitter` multiplies by `U(0.5, 1.0)`.
    ///
    /// With `base=1000ms, factor=exponential, max=60000ms, jitter=false`,
    /// attempts 1..6 schedule at cumulative `0, 1s, 3s, 7s, 15s, 31s`
    /// (spec §8) — i.e. `delay_for_attempt(n)` is the wait *before* attempt
    /// `n+1`, and `delay_for_attempt(1) == 1s`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        let raw_ms = match self.backoff {
            BackoffKind::Fixed => base_ms,
            BackoffKind::Linear => base_ms.saturating_mul(attempt as u64),
            BackoffKind::Exponential => {
                let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
                base_ms.saturating_mul(factor)
            }
        };
        let capped_ms = raw_ms.min(max_ms);
        let final_ms = if self.jitter {
            (capped_ms as f64 * jitter_multiplier()) as u64
        } else {
            capped_ms
        };
        Duration::from_millis(final_ms)
    }
}

/// A multiplier in `[0.5, 1.0)` derived from a fresh v4 UUID, the same
/// randomness source the id generator uses (`guardant_proto::ids`).
fn jitter_multiplier() -> f64 {
    let bytes = Uuid::new_v4().into_bytes();
    let n = u32::from_be_bytes(bytes[0..4].try_into().expect("4 bytes"));
    0.5 + (n as f64 / u32::MAX as f64) * 0.5
}

/// Classifies a processor error message as recoverable or not (spec §4.4:
/// "Non-recoverable errors ... short-circuit retries").
pub struct Recoverability;

impl Recoverability {
    const NON_RECOVERABLE_PATTERNS: &'static [&'static str] =
        &["validation", "invalid input", "authorization", "not found", "forbidden"];

    pub fn classify(message: &str) -> bool {
        let lower = message.to_lowercase();
        !Self::NON_RECOVERABLE_PATTERNS.iter().any(|p| lower.contains(p))
    }
}
