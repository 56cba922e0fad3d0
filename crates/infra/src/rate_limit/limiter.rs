use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use ridelink_core::ClientKey;

use super::in_memory::InMemoryRateWindowStore;
use super::store::{RatePolicy, RateWindowStore};
use super::window::{Decision, RateWindowState, WindowStrategy};
use crate::clock::{Clock, SystemClock};

pub const DEFAULT_DENIAL_MESSAGE: &str = "Too many login attempts, please try again later.";

/// Rate limiter configuration (fixed at construction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Length of one counting window. Must be non-zero.
    pub window: Duration,
    pub max_requests: NonZeroU32,
    /// Message sent in the body of a 429 response.
    pub denial_message: String,
    pub strategy: WindowStrategy,
    /// Keys idle for this long become eviction candidates.
    /// `None` means three windows.
    pub idle_ttl: Option<Duration>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(15 * 60),
            max_requests: NonZeroU32::MIN.saturating_add(14),
            denial_message: DEFAULT_DENIAL_MESSAGE.to_string(),
            strategy: WindowStrategy::FixedReset,
            idle_ttl: None,
        }
    }
}

impl RateLimiterConfig {
    pub fn new(max_requests: NonZeroU32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            ..Self::default()
        }
    }

    pub fn with_denial_message(mut self, msg: impl Into<String>) -> Self {
        self.denial_message = msg.into();
        self
    }

    pub fn with_strategy(mut self, strategy: WindowStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = Some(ttl);
        self
    }

    /// Effective eviction horizon; never shorter than one window.
    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
            .unwrap_or(self.window.saturating_mul(3))
            .max(self.window)
    }

    pub fn policy(&self) -> RatePolicy {
        RatePolicy {
            max_requests: self.max_requests,
            window: self.window,
            strategy: self.strategy,
        }
    }
}

/// Per-client admission controller.
///
/// Each limiter owns its store, so two limiters (e.g. one per route group)
/// never share counters unless they are handed the same store on purpose.
/// `check` never fails; it only returns a decision.
pub struct RateLimiter {
    config: RateLimiterConfig,
    store: Arc<dyn RateWindowStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Limiter with a fresh in-memory store and the system clock.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryRateWindowStore::new()))
    }

    pub fn with_store(config: RateLimiterConfig, store: Arc<dyn RateWindowStore>) -> Self {
        Self {
            config,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    pub fn denial_message(&self) -> &str {
        &self.config.denial_message
    }

    /// Admit or deny one request from `key`.
    pub fn check(&self, key: &ClientKey) -> Decision {
        let decision = self
            .store
            .admit(key, self.clock.now(), &self.config.policy());

        if !decision.allowed {
            debug!(
                client_key = %key,
                limit = decision.limit,
                retry_after_ms = decision.retry_after.map(|d| d.as_millis() as u64),
                "rate limit exceeded"
            );
        }

        decision
    }

    /// Evict keys that have been idle past the configured horizon.
    pub fn purge_idle(&self) -> usize {
        self.store
            .purge_idle(self.clock.now(), self.config.idle_ttl())
    }

    /// Forget everything about `key`.
    pub fn reset(&self, key: &ClientKey) -> bool {
        self.store.remove(key)
    }

    pub fn snapshot(&self, key: &ClientKey) -> Option<RateWindowState> {
        self.store.snapshot(key)
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("tracked_keys", &self.store.len())
            .finish()
    }
}
