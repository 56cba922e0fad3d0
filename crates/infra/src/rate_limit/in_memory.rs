use std::time::{Duration, Instant};

use dashmap::DashMap;

use ridelink_core::ClientKey;

use super::store::{RatePolicy, RateWindowStore};
use super::window::{Decision, RateWindowState};

/// Process-local rate-window store.
///
/// Backed by a sharded `DashMap`: the entry guard holds the shard lock for
/// the whole check-and-increment, and eviction takes the same lock, so a
/// purge can never interleave with an in-flight check on the same key.
#[derive(Debug, Default)]
pub struct InMemoryRateWindowStore {
    entries: DashMap<ClientKey, RateWindowState>,
}

impl InMemoryRateWindowStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl RateWindowStore for InMemoryRateWindowStore {
    fn admit(&self, key: &ClientKey, now: Instant, policy: &RatePolicy) -> Decision {
        if let Some(mut state) = self.entries.get_mut(key) {
            return state.admit(now, policy.strategy);
        }

        let mut state = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| RateWindowState::new(now, policy.max_requests, policy.window));
        state.admit(now, policy.strategy)
    }

    fn snapshot(&self, key: &ClientKey) -> Option<RateWindowState> {
        self.entries.get(key).map(|s| s.value().clone())
    }

    fn remove(&self, key: &ClientKey) -> bool {
        self.entries.remove(key).is_some()
    }

    fn purge_idle(&self, now: Instant, idle_ttl: Duration) -> usize {
        let mut evicted = 0;
        self.entries.retain(|_, state| {
            let keep = !state.is_evictable(now, idle_ttl);
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;
    use crate::rate_limit::WindowStrategy;

    fn policy(max: u32) -> RatePolicy {
        RatePolicy {
            max_requests: NonZeroU32::new(max).unwrap(),
            window: Duration::from_secs(60),
            strategy: WindowStrategy::FixedReset,
        }
    }

    #[test]
    fn state_is_created_lazily() {
        let store = InMemoryRateWindowStore::new();
        let key = ClientKey::from("10.0.0.1");
        assert!(store.is_empty());
        assert!(store.snapshot(&key).is_none());

        let t0 = Instant::now();
        assert!(store.admit(&key, t0, &policy(2)).allowed);

        let s = store.snapshot(&key).unwrap();
        assert_eq!(s.count(), 1);
        assert_eq!(s.limit(), 2);
        assert_eq!(s.window_start(), t0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_checks_admit_exactly_the_limit() {
        const THREADS: usize = 16;
        const PER_THREAD: usize = 25;
        const LIMIT: u32 = 40;

        let store = Arc::new(InMemoryRateWindowStore::new());
        let barrier = Arc::new(Barrier::new(THREADS));
        let now = Instant::now();
        let p = policy(LIMIT);

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let key = ClientKey::from("shared");
                    barrier.wait();
                    (0..PER_THREAD)
                        .filter(|_| store.admit(&key, now, &p).allowed)
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, LIMIT as usize);
        assert_eq!(store.snapshot(&ClientKey::from("shared")).unwrap().count(), LIMIT);
    }

    /// Admits from `THREADS` threads while two more threads purge in a loop,
    /// all at the same instant. Returns how many admits were allowed.
    fn admit_while_purging(
        store: &Arc<InMemoryRateWindowStore>,
        now: Instant,
        p: RatePolicy,
    ) -> usize {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 50;
        const PURGERS: usize = 2;

        let barrier = Arc::new(Barrier::new(THREADS + PURGERS));
        let done = Arc::new(AtomicBool::new(false));

        let purgers: Vec<_> = (0..PURGERS)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                let done = done.clone();
                thread::spawn(move || {
                    barrier.wait();
                    while !done.load(Ordering::Acquire) {
                        store.purge_idle(now, Duration::ZERO);
                    }
                })
            })
            .collect();

        let admitters: Vec<_> = (0..THREADS)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let key = ClientKey::from("shared");
                    barrier.wait();
                    (0..PER_THREAD)
                        .filter(|_| store.admit(&key, now, &p).allowed)
                        .count()
                })
            })
            .collect();

        let admitted: usize = admitters.into_iter().map(|h| h.join().unwrap()).sum();
        done.store(true, Ordering::Release);
        for h in purgers {
            h.join().unwrap();
        }
        admitted
    }

    #[test]
    fn purge_never_resets_a_live_window() {
        const LIMIT: u32 = 30;
        let store = Arc::new(InMemoryRateWindowStore::new());
        let t0 = Instant::now();
        let p = policy(LIMIT);

        // Mid-window: the key is never evictable, so the budget holds exactly.
        let mid = t0 + Duration::from_secs(30);
        store.admit(&ClientKey::from("shared"), t0, &p);
        let admitted = admit_while_purging(&store, mid, p);
        assert_eq!(admitted, LIMIT as usize - 1);
        assert_eq!(store.snapshot(&ClientKey::from("shared")).unwrap().count(), LIMIT);

        // Two windows later the old state is evictable. Whichever of purge or
        // admit wins, the fresh window still admits at most the limit.
        let later = t0 + Duration::from_secs(120);
        let admitted = admit_while_purging(&store, later, p);
        assert_eq!(admitted, LIMIT as usize);
        let state = store.snapshot(&ClientKey::from("shared")).unwrap();
        assert_eq!(state.count(), LIMIT);
        assert_eq!(state.window_start(), later);
    }

    #[test]
    fn purge_removes_only_idle_spent_keys() {
        let store = InMemoryRateWindowStore::new();
        let t0 = Instant::now();
        let p = policy(5);
        let idle = ClientKey::from("idle");
        let busy = ClientKey::from("busy");

        store.admit(&idle, t0, &p);
        store.admit(&busy, t0, &p);
        store.admit(&busy, t0 + Duration::from_secs(170), &p);

        let evicted = store.purge_idle(t0 + Duration::from_secs(180), Duration::from_secs(180));
        assert_eq!(evicted, 1);
        assert!(store.snapshot(&idle).is_none());
        assert!(store.snapshot(&busy).is_some());
    }

    #[test]
    fn remove_clears_a_key() {
        let store = InMemoryRateWindowStore::new();
        let key = ClientKey::from("k");
        store.admit(&key, Instant::now(), &policy(1));

        assert!(store.remove(&key));
        assert!(!store.remove(&key));
        assert!(store.admit(&key, Instant::now(), &policy(1)).allowed);
    }
}
