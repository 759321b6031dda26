//! Fixed window counter.

use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::limiter::{Algorithm, RateLimiter};
use super::options::{Decision, LimiterOptions};
use super::store::KeyStore;

/// Count of requests seen in one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowCount {
    count: u64,
    window_id: u64,
}

/// Counts requests in fixed, non-overlapping windows of `window_size_ms`.
///
/// Cheap (one counter per key) but allows up to twice the budget across a
/// window boundary: a full burst at the end of one window and another at the
/// start of the next are both admitted.
pub struct FixedWindowCounter<C: Clock = SystemClock> {
    options: LimiterOptions,
    clock: C,
    windows: KeyStore<WindowCount>,
}

impl FixedWindowCounter {
    /// Create a counter reading the system clock.
    pub fn new(options: LimiterOptions) -> Self {
        Self::with_clock(options, SystemClock)
    }
}

impl<C: Clock> FixedWindowCounter<C> {
    /// Create a counter reading time from `clock`.
    pub fn with_clock(options: LimiterOptions, clock: C) -> Self {
        Self {
            options,
            clock,
            windows: KeyStore::new(options.max_keys()),
        }
    }

    /// Check and record a request for `key` at `now_ms`.
    pub fn allow_at(&self, key: &str, now_ms: u64) -> Decision {
        let window_size = self.options.window_size_ms();
        let max_requests = self.options.max_requests();

        let window_id = now_ms / window_size;
        let reset_time = window_id.saturating_add(1).saturating_mul(window_size);

        let decision = self.windows.with_entry(
            key,
            || {
                debug!(key = %key, window_id, "Creating fixed window counter");
                WindowCount {
                    count: 0,
                    window_id,
                }
            },
            |state| {
                if state.window_id != window_id {
                    state.window_id = window_id;
                    state.count = 0;
                }

                if state.count < max_requests {
                    state.count += 1;
                    Decision::allow(max_requests - state.count, reset_time)
                } else {
                    Decision::reject(reset_time)
                }
            },
        );

        if !decision.allowed {
            debug!(key = %key, window_id, "Fixed window limit exceeded");
        }
        trace!(key = %key, now_ms, ?decision, "Fixed window decision");

        decision
    }

    /// Requests counted for `key` in the window it was last seen in.
    pub fn current_count(&self, key: &str) -> Option<u64> {
        self.windows.peek(key, |state| state.count)
    }
}

impl<C: Clock> RateLimiter for FixedWindowCounter<C> {
    fn allow(&self, key: &str) -> Decision {
        self.allow_at(key, self.clock.now_ms())
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::FixedWindow
    }

    fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
