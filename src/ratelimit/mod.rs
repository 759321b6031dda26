//! Rate limiting algorithms and per-key state management.

mod clock;
mod fixed_window;
mod leaky_bucket;
mod limiter;
mod options;
mod sliding_window_counter;
mod sliding_window_log;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use fixed_window::FixedWindowCounter;
pub use leaky_bucket::LeakyBucket;
pub use limiter::{Algorithm, RateLimiter};
pub use options::{Decision, LimiterOptions};
pub use sliding_window_counter::SlidingWindowCounter;
pub use sliding_window_log::SlidingWindowLog;
