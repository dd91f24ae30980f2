//! Bounded ring buffers for per-endpoint health sampling (spec §4.5).
//!
//! Grounded on the teacher's `TimeSeriesBuffer` (fixed-capacity ring of
//! per-instance snapshots with eviction-on-capacity) and the averaging
//! pattern `FleetMetrics::compute` used for rollups. Generalized here into
//! a type-agnostic buffer: callers bring their own sample shape and a
//! [`Timestamped`] impl, and this crate owns only capacity and the
//! windowed-average arithmetic on top of it. `guardant-failover` is the
//! one real consumer — one buffer per endpoint.

#![forbid(unsafe_code)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::collections::VecDeque;

/// A sample that knows when it was taken, so windowed queries can filter
/// on age without the buffer knowing anything else about the sample shape.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// A fixed-capacity, single-writer/multi-reader ring buffer. Pushing past
/// capacity evicts the oldest sample (spec §5: "single-writer... a
/// snapshot-on-read discipline is sufficient").
pub struct RingBuffer<T> {
    capacity: usize,
    samples: RwLock<VecDeque<T>>,
}

impl<T: Clone> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), samples: RwLock::new(VecDeque::with_capacity(capacity.max(1))) }
    }

    pub fn push(&self, sample: T) {
        let mut guard = self.samples.write();
        if guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(sample);
    }

    /// A point-in-time copy, oldest first. Cheap enough to call on every
    /// rule-evaluation tick since endpoint buffers are small.
    pub fn snapshot(&self) -> Vec<T> {
        self.samples.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Clone + Timestamped> RingBuffer<T> {
    /// Samples newer than `now - window`, oldest first.
    pub fn within_window(&self, now: DateTime<Utc>, window: std::time::Duration) -> Vec<T> {
        let cutoff = now - ChronoDuration::from_std(window).unwrap_or(ChronoDuration::seconds(0));
        self.samples.read().iter().filter(|s| s.timestamp() >= cutoff).cloned().collect()
    }
}

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Percentage of `predicate` matches in `items`, or `0.0` when empty.
pub fn rate_pct<T>(items: &[T], predicate: impl Fn(&T) -> bool) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    100.0 * items.iter().filter(|i| predicate(i)).count() as f64 / items.len() as f64
}
