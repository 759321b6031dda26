//! Sliding window log.

use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::limiter::{Algorithm, RateLimiter};
use super::options::{Decision, LimiterOptions};
use super::store::KeyStore;

/// Exact sliding window: remembers the timestamp of every admitted request
/// still inside the trailing `window_size_ms`.
///
/// Memory per key grows with `max_requests`, in exchange for no boundary
/// effects at all.
pub struct SlidingWindowLog<C: Clock = SystemClock> {
    options: LimiterOptions,
    clock: C,
    logs: KeyStore<Vec<u64>>,
}

impl SlidingWindowLog {
    /// Create a log reading the system clock.
    pub fn new(options: LimiterOptions) -> Self {
        Self::with_clock(options, SystemClock)
    }
}

impl<C: Clock> SlidingWindowLog<C> {
    /// Create a log reading time from `clock`.
    pub fn with_clock(options: LimiterOptions, clock: C) -> Self {
        Self {
            options,
            clock,
            logs: KeyStore::new(options.max_keys()),
        }
    }

    /// Check and record a request for `key` at `now_ms`.
    pub fn allow_at(&self, key: &str, now_ms: u64) -> Decision {
        let window_size = self.options.window_size_ms();
        let max_requests = self.options.max_requests();
        // Before the first full window has elapsed nothing can be expired.
        let window_start = now_ms.checked_sub(window_size);

        let decision = self.logs.with_entry(
            key,
            || {
                debug!(key = %key, "Creating sliding window log");
                Vec::new()
            },
            |log| {
                if let Some(start) = window_start {
                    log.retain(|&timestamp| timestamp > start);
                }

                let admitted = (log.len() as u64) < max_requests;
                if admitted {
                    log.push(now_ms);
                }

                // A clock stepping backwards can leave the log unsorted
                let oldest = log.iter().min().copied().unwrap_or(now_ms);
                let reset_time = oldest.saturating_add(window_size);

                if admitted {
                    Decision::allow(max_requests - log.len() as u64, reset_time)
                } else {
                    Decision::reject(reset_time)
                }
            },
        );

        if !decision.allowed {
            debug!(key = %key, reset_time = decision.reset_time, "Sliding window log full");
        }
        trace!(key = %key, now_ms, ?decision, "Sliding window log decision");

        decision
    }

    /// Number of logged requests for `key`, as of its last check.
    pub fn log_len(&self, key: &str) -> Option<usize> {
        self.logs.peek(key, Vec::len)
    }
}

impl<C: Clock> RateLimiter for SlidingWindowLog<C> {
    fn allow(&self, key: &str) -> Decision {
        self.allow_at(key, self.clock.now_ms())
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::SlidingWindowLog
    }

    fn tracked_keys(&self) -> usize {
        self.logs.len()
    }
}
