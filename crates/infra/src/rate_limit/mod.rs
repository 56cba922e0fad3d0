//! Per-client request rate limiting.
//!
//! ```text
//! RateLimiter::check(key)
//!   ↓
//! RateWindowStore::admit(key, now, policy)    (atomic per key)
//!   ↓
//! RateWindowState::admit(now, strategy)       (window algorithm)
//!   ↓
//! Decision { allowed, retry_after, limit, remaining }
//! ```
//!
//! The store is injected so a limiter can move to a shared backing store
//! without touching call sites. Idle keys are evicted by `purge_idle`, either
//! called directly or from the background task started by `spawn_sweeper`.

pub mod in_memory;
pub mod limiter;
pub mod store;
pub mod sweeper;
pub mod window;

pub use in_memory::InMemoryRateWindowStore;
pub use limiter::{RateLimiter, RateLimiterConfig, DEFAULT_DENIAL_MESSAGE};
pub use store::{RatePolicy, RateWindowStore};
pub use sweeper::{spawn_sweeper, SweeperHandle};
pub use window::{Decision, RateWindowState, WindowStrategy};
