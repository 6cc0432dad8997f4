//! Consecutive-failure circuit breaker with adaptive timeouts.
//!
//! The breaker is a plain state object exclusively owned by its
//! session's command executor; the executor serializes all command
//! traffic, so no internal locking is needed.

use std::time::Duration;

use tokio::time::Instant;

/// Consecutive failures required before the breaker opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Backoff window unit; the open window is `backoff_unit × failures`.
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Failure-counting guard for one session's command path.
#[derive(Debug)]
pub struct CircuitBreaker {
    failures: u32,
    last_failure: Option<Instant>,
    threshold: u32,
    backoff_unit: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, backoff_unit: Duration) -> Self {
        Self {
            failures: 0,
            last_failure: None,
            threshold: threshold.max(1),
            backoff_unit,
        }
    }

    /// Count a transport failure.
    pub fn record_failure(&mut self) {
        self.failures += 1;
        self.last_failure = Some(Instant::now());
    }

    /// A successful command resets the failure count.
    pub fn record_success(&mut self) {
        self.failures = 0;
        self.last_failure = None;
    }

    /// Whether the next call must be rejected without I/O.
    ///
    /// Returns the remaining backoff when the breaker is open. Once the
    /// backoff window has elapsed the failure count is reset and a probe
    /// call is allowed through.
    pub fn should_reject(&mut self) -> Option<Duration> {
        if self.failures < self.threshold {
            return None;
        }
        let last = self.last_failure?;
        let window = self.backoff_unit * self.failures;
        let elapsed = last.elapsed();
        if elapsed < window {
            return Some(window - elapsed);
        }
        self.failures = 0;
        self.last_failure = None;
        None
    }

    /// Effective per-call deadline: `base × (1 + failures)`.
    ///
    /// Degraded devices get progressively longer waits instead of being
    /// hammered at a fixed cadence.
    pub fn effective_timeout(&self, base: Duration) -> Duration {
        base * (1 + self.failures)
    }

    /// Current consecutive-failure count.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_BACKOFF_UNIT)
    }
}
