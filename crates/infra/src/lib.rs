//! Infrastructure layer: rate-limit state, clocks, configuration.

pub mod clock;
pub mod config;
pub mod rate_limit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, GovernanceConfig};
pub use rate_limit::{Decision, RateLimiter, RateLimiterConfig, RateWindowStore, WindowStrategy};
