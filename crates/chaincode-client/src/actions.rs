//! Queue of unresolved state-changing actions.
//!
//! Each successful invoke records when it was dispatched. The queue is a
//! liveness signal for the height monitor, not a confirmation mechanism:
//! an observed height change resolves one entry without correlating it to
//! any transaction, and entries past the freshness window are dropped
//! whether or not their effect was ever observed.

use tokio::time::{Duration, Instant};

/// Last-in-first-out collection of dispatch timestamps.
#[derive(Debug, Clone, Default)]
pub struct ActionQueue {
    entries: Vec<Instant>,
}

impl ActionQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an action dispatched at `at`.
    pub fn push(&mut self, at: Instant) {
        self.entries.push(at);
    }

    /// Resolve the most recently recorded action.
    pub fn resolve_one(&mut self) -> Option<Instant> {
        self.entries.pop()
    }

    /// Drop every action at or beyond `window` old and return how many
    /// fresh actions remain.
    pub fn retain_fresh(&mut self, now: Instant, window: Duration) -> usize {
        self.entries.retain(|at| now.saturating_duration_since(*at) < window);
        self.entries.len()
    }

    /// Number of unresolved actions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no actions are outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
