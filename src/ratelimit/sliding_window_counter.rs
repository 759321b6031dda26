//! Sliding window counter.
//!
//! Approximates a true sliding window by blending the count of the previous
//! fixed window into the current one. The previous window's weight is the
//! fraction of it still covered by a window ending now:
//!
//! ```text
//! estimated = current + previous * (window_size - elapsed_in_current) / window_size
//! ```
//!
//! Two counters per key, no timestamps, and no boundary bursts beyond what the
//! linear estimate lets through.

use std::cmp::Ordering;

use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::limiter::{Algorithm, RateLimiter};
use super::options::{Decision, LimiterOptions};
use super::store::KeyStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowPair {
    current_count: u64,
    previous_count: u64,
    current_window_id: u64,
}

impl WindowPair {
    /// Roll the pair forward to `window_id`.
    fn advance_to(&mut self, window_id: u64) {
        match window_id.cmp(&self.current_window_id) {
            Ordering::Greater if window_id - self.current_window_id == 1 => {
                self.previous_count = self.current_count;
                self.current_count = 0;
            }
            Ordering::Greater => {
                // Both windows are stale
                self.previous_count = 0;
                self.current_count = 0;
            }
            Ordering::Equal | Ordering::Less => {}
        }
        self.current_window_id = window_id;
    }
}

/// Weighted two-window counter admitting roughly `max_requests` per
/// `window_size_ms` over any trailing span.
pub struct SlidingWindowCounter<C: Clock = SystemClock> {
    options: LimiterOptions,
    clock: C,
    counters: KeyStore<WindowPair>,
}

impl SlidingWindowCounter {
    /// Create a counter reading the system clock.
    pub fn new(options: LimiterOptions) -> Self {
        Self::with_clock(options, SystemClock)
    }
}

impl<C: Clock> SlidingWindowCounter<C> {
    /// Create a counter reading time from `clock`.
    pub fn with_clock(options: LimiterOptions, clock: C) -> Self {
        Self {
            options,
            clock,
            counters: KeyStore::new(options.max_keys()),
        }
    }

    /// Check and record a request for `key` at `now_ms`.
    pub fn allow_at(&self, key: &str, now_ms: u64) -> Decision {
        let window_size = self.options.window_size_ms();
        let max_requests = self.options.max_requests() as f64;

        let window_id = now_ms / window_size;
        let elapsed = now_ms % window_size;
        let reset_time = window_id.saturating_add(1).saturating_mul(window_size);

        let decision = self.counters.with_entry(
            key,
            || {
                debug!(key = %key, window_id, "Creating sliding window counter");
                WindowPair {
                    current_count: 0,
                    previous_count: 0,
                    current_window_id: window_id,
                }
            },
            |pair| {
                pair.advance_to(window_id);

                let carried = pair.previous_count as f64 * (window_size - elapsed) as f64
                    / window_size as f64;
                let estimated = pair.current_count as f64 + carried;

                if estimated < max_requests {
                    pair.current_count += 1;
                    let remaining = (max_requests - (estimated + 1.0)).floor().max(0.0);
                    Decision::allow(remaining as u64, reset_time)
                } else {
                    Decision::reject(reset_time)
                }
            },
        );

        if !decision.allowed {
            debug!(key = %key, window_id, "Sliding window limit exceeded");
        }
        trace!(key = %key, now_ms, ?decision, "Sliding window counter decision");

        decision
    }

    /// `(current, previous)` window counts for `key`.
    pub fn counts(&self, key: &str) -> Option<(u64, u64)> {
        self.counters
            .peek(key, |pair| (pair.current_count, pair.previous_count))
    }
}

impl<C: Clock> RateLimiter for SlidingWindowCounter<C> {
    fn allow(&self, key: &str) -> Decision {
        self.allow_at(key, self.clock.now_ms())
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::SlidingWindowCounter
    }

    fn tracked_keys(&self) -> usize {
        self.counters.len()
    }
}
