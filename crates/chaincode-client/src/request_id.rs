//! Request ids derived from the wall clock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues unique, non-decreasing request ids based on UNIX milliseconds.
///
/// Two requests in the same millisecond get consecutive ids.
#[derive(Debug, Default)]
pub struct RequestIdClock {
    last: AtomicU64,
}

impl RequestIdClock {
    /// Create a new clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next request id.
    pub fn next_id(&self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}
