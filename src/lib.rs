//! Ratekeeper - In-Process Request Admission
//!
//! This crate decides, per caller key, whether a request may proceed. Four
//! interchangeable algorithms (fixed window, leaky bucket, sliding window
//! counter and sliding window log) share one [`RateLimiter`] contract, so a
//! caller can swap algorithms without touching call sites.
//!
//! ```
//! use ratekeeper::{FixedWindowCounter, LimiterOptions, ManualClock, RateLimiter};
//!
//! let clock = ManualClock::new(0);
//! let options = LimiterOptions::new(1000, 2).unwrap();
//! let limiter = FixedWindowCounter::with_clock(options, clock.clone());
//!
//! assert!(limiter.allow("alice").allowed);
//! assert!(limiter.allow("alice").allowed);
//! assert!(!limiter.allow("alice").allowed);
//!
//! clock.advance(1000);
//! assert!(limiter.allow("alice").allowed);
//! ```

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod replay;
pub mod simulate;

pub use error::{RatekeeperError, Result};
pub use ratelimit::{
    Algorithm, Clock, Decision, FixedWindowCounter, LeakyBucket, LimiterOptions, ManualClock,
    RateLimiter, SlidingWindowCounter, SlidingWindowLog, SystemClock,
};
