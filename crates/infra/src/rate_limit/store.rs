use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ridelink_core::ClientKey;

use super::window::{Decision, RateWindowState, WindowStrategy};

/// Limits applied to a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub max_requests: NonZeroU32,
    pub window: Duration,
    pub strategy: WindowStrategy,
}

/// Keyed storage for rate-window state.
///
/// Implementations must make `admit` a single atomic read-modify-write per
/// key: two concurrent calls for the same key must never both observe spare
/// capacity for the last permit. Calls for different keys should not block
/// each other.
pub trait RateWindowStore: Send + Sync {
    /// Run one admission check for `key`, creating its state on first use.
    fn admit(&self, key: &ClientKey, now: Instant, policy: &RatePolicy) -> Decision;

    /// Copy of the current state for `key` (monitoring/tests).
    fn snapshot(&self, key: &ClientKey) -> Option<RateWindowState>;

    /// Drop the state for `key`. Returns whether anything was removed.
    fn remove(&self, key: &ClientKey) -> bool;

    /// Evict every key idle for at least `idle_ttl` whose window has fully
    /// elapsed. Returns the number of evicted keys.
    fn purge_idle(&self, now: Instant, idle_ttl: Duration) -> usize;

    /// Number of tracked keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> RateWindowStore for Arc<S>
where
    S: RateWindowStore + ?Sized,
{
    fn admit(&self, key: &ClientKey, now: Instant, policy: &RatePolicy) -> Decision {
        (**self).admit(key, now, policy)
    }

    fn snapshot(&self, key: &ClientKey) -> Option<RateWindowState> {
        (**self).snapshot(key)
    }

    fn remove(&self, key: &ClientKey) -> bool {
        (**self).remove(key)
    }

    fn purge_idle(&self, now: Instant, idle_ttl: Duration) -> usize {
        (**self).purge_idle(now, idle_ttl)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}
