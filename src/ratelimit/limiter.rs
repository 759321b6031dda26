//! The common admission contract and algorithm selection.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::clock::Clock;
use super::fixed_window::FixedWindowCounter;
use super::leaky_bucket::LeakyBucket;
use super::options::{Decision, LimiterOptions};
use super::sliding_window_counter::SlidingWindowCounter;
use super::sliding_window_log::SlidingWindowLog;

/// Trait implemented by every rate limiting algorithm.
///
/// Implementations are thread-safe; concurrent calls for the same key are
/// serialized so two callers can never both claim the last free slot.
pub trait RateLimiter: Send + Sync {
    /// Decide whether a request for `key` may proceed, recording it if so.
    fn allow(&self, key: &str) -> Decision;

    /// The algorithm backing this limiter.
    fn algorithm(&self) -> Algorithm;

    /// Number of keys with state held by this limiter.
    fn tracked_keys(&self) -> usize;
}

/// Available rate limiting algorithms.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// One counter per fixed window
    #[default]
    FixedWindow,
    /// Continuously draining bucket
    LeakyBucket,
    /// Weighted blend of the current and previous windows
    SlidingWindowCounter,
    /// Timestamp log of admitted requests
    SlidingWindowLog,
}

impl Algorithm {
    /// Every algorithm, in declaration order.
    pub const ALL: [Algorithm; 4] = [
        Algorithm::FixedWindow,
        Algorithm::LeakyBucket,
        Algorithm::SlidingWindowCounter,
        Algorithm::SlidingWindowLog,
    ];

    /// The kebab-case name used in configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::FixedWindow => "fixed-window",
            Algorithm::LeakyBucket => "leaky-bucket",
            Algorithm::SlidingWindowCounter => "sliding-window-counter",
            Algorithm::SlidingWindowLog => "sliding-window-log",
        }
    }

    /// Construct a limiter of this kind.
    pub fn build<C: Clock + 'static>(
        self,
        options: LimiterOptions,
        clock: C,
    ) -> Box<dyn RateLimiter> {
        match self {
            Algorithm::FixedWindow => Box::new(FixedWindowCounter::with_clock(options, clock)),
            Algorithm::LeakyBucket => Box::new(LeakyBucket::with_clock(options, clock)),
            Algorithm::SlidingWindowCounter => {
                Box::new(SlidingWindowCounter::with_clock(options, clock))
            }
            Algorithm::SlidingWindowLog => Box::new(SlidingWindowLog::with_clock(options, clock)),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
