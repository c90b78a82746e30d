//! Failure-storm detection for long-poll loops.

use serde::Deserialize;
use std::collections::{BTreeSet, VecDeque};

/// Thresholds of the failure-storm guard.
///
/// A storm is declared when the window is full (`window` failures) and those
/// failures happened within at most `max_distinct_instants` distinct seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StormPolicy {
    /// Number of consecutive failures remembered.
    pub window: usize,
    /// Largest number of distinct timestamps that still counts as a burst.
    pub max_distinct_instants: usize,
}

impl Default for StormPolicy {
    fn default() -> Self {
        Self {
            window: 5,
            max_distinct_instants: 2,
        }
    }
}

/// Fixed-capacity FIFO of failure timestamps (unix seconds).
///
/// # Examples
///
/// ```rust
/// use apollo_watch::notify::{FailureWindow, StormPolicy};
///
/// let mut window = FailureWindow::new(StormPolicy::default());
/// for _ in 0..5 {
///     window.record(1_700_000_000);
/// }
/// assert!(window.is_storm());
/// ```
#[derive(Debug, Clone)]
pub struct FailureWindow {
    policy: StormPolicy,
    timestamps: VecDeque<i64>,
}

impl FailureWindow {
    /// Create an empty window.
    pub fn new(policy: StormPolicy) -> Self {
        let capacity = policy.window.max(1);
        Self {
            policy: StormPolicy {
                window: capacity,
                ..policy
            },
            timestamps: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a failure at `now` (unix seconds), evicting the oldest entry when full.
    pub fn record(&mut self, now: i64) {
        if self.timestamps.len() == self.policy.window {
            self.timestamps.pop_front();
        }
        self.timestamps.push_back(now);
    }

    /// Forget all failures.
    pub fn clear(&mut self) {
        self.timestamps.clear();
    }

    /// Number of failures currently held.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the window holds no failures.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Number of distinct timestamps among the held failures.
    pub fn distinct_instants(&self) -> usize {
        self.timestamps.iter().collect::<BTreeSet<_>>().len()
    }

    /// Whether the held failures form a storm.
    pub fn is_storm(&self) -> bool {
        self.timestamps.len() == self.policy.window
            && self.distinct_instants() <= self.policy.max_distinct_instants
    }

    /// The thresholds in use.
    pub fn policy(&self) -> StormPolicy {
        self.policy
    }
}
