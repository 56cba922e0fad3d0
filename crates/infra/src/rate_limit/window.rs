//! Per-key window state and the admission algorithm.
//!
//! ## Fixed reset (default)
//!
//! ```text
//! elapsed = now - window_start
//! elapsed >= window      → window_start = now, count = 0
//! count < limit          → count += 1, allow
//! otherwise              → deny, retry after (window - elapsed)
//! ```
//!
//! This approximates a sliding window. Right after a reset a client may spend
//! its whole budget again no matter how busy the previous window was, so up to
//! `2 × limit` requests can land in a span of one window that straddles a reset.
//!
//! ## Sliding counter
//!
//! Keeps the previous window's count and weights it by how much of the
//! previous window still overlaps the trailing `window`:
//!
//! ```text
//! estimate = previous × (1 - elapsed / window) + count
//! estimate + 1 <= limit  → count += 1, allow
//! ```

use std::num::NonZeroU32;
use std::time::{Duration, Instant};

/// How window boundaries are handled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum WindowStrategy {
    /// Counter resets when the window has fully elapsed.
    #[default]
    FixedReset,
    /// Two-counter weighted estimate of a true sliding window.
    SlidingCounter,
}

impl WindowStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowStrategy::FixedReset => "fixed",
            WindowStrategy::SlidingCounter => "sliding",
        }
    }
}

impl core::str::FromStr for WindowStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" | "fixed_reset" => Ok(WindowStrategy::FixedReset),
            "sliding" | "sliding_counter" => Ok(WindowStrategy::SlidingCounter),
            other => Err(format!("unknown window strategy '{other}'")),
        }
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Set only on denial; always greater than zero.
    pub retry_after: Option<Duration>,
    pub limit: u32,
    /// Requests still admissible in the current window.
    pub remaining: u32,
}

impl Decision {
    pub fn allow(limit: u32, remaining: u32) -> Self {
        Self {
            allowed: true,
            retry_after: None,
            limit,
            remaining,
        }
    }

    pub fn deny(limit: u32, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after.max(Duration::from_millis(1))),
            limit,
            remaining: 0,
        }
    }

    /// `retry_after` rounded up to whole seconds (at least 1), as sent in `Retry-After`.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after.map(|d| {
            let secs = d.as_secs().saturating_add(u64::from(d.subsec_nanos() > 0));
            secs.max(1)
        })
    }
}

/// Rate-limit state for one client key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateWindowState {
    window_start: Instant,
    count: u32,
    previous_count: u32,
    limit: u32,
    window_duration: Duration,
    last_seen: Instant,
}

impl RateWindowState {
    /// Fresh state; `window_duration` is expected to be non-zero.
    pub fn new(now: Instant, limit: NonZeroU32, window_duration: Duration) -> Self {
        Self {
            window_start: now,
            count: 0,
            previous_count: 0,
            limit: limit.get(),
            window_duration,
            last_seen: now,
        }
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Admitted requests in the current window.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn previous_count(&self) -> u32 {
        self.previous_count
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window_duration(&self) -> Duration {
        self.window_duration
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Run one admission check, mutating the counters.
    ///
    /// Callers must hold exclusive access to `self` for the whole call; that
    /// is what makes check-and-increment atomic per key.
    pub fn admit(&mut self, now: Instant, strategy: WindowStrategy) -> Decision {
        self.last_seen = self.last_seen.max(now);
        match strategy {
            WindowStrategy::FixedReset => self.admit_fixed(now),
            WindowStrategy::SlidingCounter => self.admit_sliding(now),
        }
    }

    /// True when the state has been idle for `idle_ttl` and no longer
    /// influences any future decision.
    pub fn is_evictable(&self, now: Instant, idle_ttl: Duration) -> bool {
        let idle = now.saturating_duration_since(self.last_seen) >= idle_ttl;
        // Two windows covers the previous-window weight of the sliding strategy.
        let spent = now.saturating_duration_since(self.window_start)
            >= self.window_duration.saturating_mul(2);
        idle && spent
    }

    fn admit_fixed(&mut self, now: Instant) -> Decision {
        let mut elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= self.window_duration {
            self.window_start = now;
            self.count = 0;
            self.previous_count = 0;
            elapsed = Duration::ZERO;
        }

        if self.count < self.limit {
            self.count += 1;
            Decision::allow(self.limit, self.limit - self.count)
        } else {
            Decision::deny(self.limit, self.window_duration - elapsed)
        }
    }

    fn admit_sliding(&mut self, now: Instant) -> Decision {
        self.roll(now);

        let window = self.window_duration.as_secs_f64();
        let elapsed = now.saturating_duration_since(self.window_start).as_secs_f64();
        let limit = f64::from(self.limit);
        let weight = if window > 0.0 {
            (1.0 - elapsed / window).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let estimate = f64::from(self.previous_count) * weight + f64::from(self.count);

        if estimate + 1.0 <= limit {
            self.count += 1;
            let remaining = (limit - estimate - 1.0).floor().max(0.0) as u32;
            return Decision::allow(self.limit, remaining);
        }

        let retry = if self.count < self.limit && self.previous_count > 0 {
            // Wait inside the current window for the previous count to decay.
            let headroom = f64::from(self.limit - self.count - 1) / f64::from(self.previous_count);
            window * (1.0 - headroom) - elapsed
        } else {
            // Current window is full: wait for the roll, then for it to decay.
            let until_roll = window - elapsed;
            let headroom = f64::from(self.limit - 1) / f64::from(self.count.max(1));
            until_roll + window * (1.0 - headroom).max(0.0)
        };

        let retry = Duration::try_from_secs_f64(retry.max(0.0)).unwrap_or(Duration::MAX);
        Decision::deny(self.limit, retry)
    }

    fn roll(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= self.window_duration.saturating_mul(2) {
            self.window_start = now;
            self.previous_count = 0;
            self.count = 0;
        } else if elapsed >= self.window_duration {
            self.window_start += self.window_duration;
            self.previous_count = self.count;
            self.count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    fn state(now: Instant, limit: u32) -> RateWindowState {
        RateWindowState::new(now, NonZeroU32::new(limit).unwrap(), WINDOW)
    }

    #[test]
    fn fixed_admits_limit_then_denies() {
        let t0 = Instant::now();
        let mut s = state(t0, 3);

        for i in 0..3 {
            let d = s.admit(t0, WindowStrategy::FixedReset);
            assert!(d.allowed, "request {i} should be allowed");
            assert_eq!(d.remaining, 2 - i);
        }

        let d = s.admit(t0 + Duration::from_secs(10), WindowStrategy::FixedReset);
        assert!(!d.allowed);
        assert_eq!(d.retry_after, Some(Duration::from_secs(50)));
        assert_eq!(s.count(), 3);
    }

    #[test]
    fn fixed_resets_after_window() {
        let t0 = Instant::now();
        let mut s = state(t0, 1);
        assert!(s.admit(t0, WindowStrategy::FixedReset).allowed);
        assert!(!s.admit(t0 + Duration::from_secs(59), WindowStrategy::FixedReset).allowed);

        let later = t0 + WINDOW;
        assert!(s.admit(later, WindowStrategy::FixedReset).allowed);
        assert_eq!(s.window_start(), later);
        assert_eq!(s.count(), 1);
    }

    #[test]
    fn fixed_allows_burst_straddling_reset() {
        let t0 = Instant::now();
        let mut s = state(t0, 5);
        let late = t0 + Duration::from_secs(59);
        let early_next = t0 + Duration::from_secs(61);

        assert!(s.admit(t0, WindowStrategy::FixedReset).allowed);
        for _ in 0..4 {
            assert!(s.admit(late, WindowStrategy::FixedReset).allowed);
        }
        for _ in 0..5 {
            assert!(s.admit(early_next, WindowStrategy::FixedReset).allowed);
        }
    }

    #[test]
    fn sliding_denies_burst_straddling_boundary() {
        let t0 = Instant::now();
        let mut s = state(t0, 5);
        let late = t0 + Duration::from_secs(59);
        let early_next = t0 + Duration::from_secs(61);

        for _ in 0..5 {
            assert!(s.admit(late, WindowStrategy::SlidingCounter).allowed);
        }

        // One second into the next window the previous five still weigh ~4.9.
        let d = s.admit(early_next, WindowStrategy::SlidingCounter);
        assert!(!d.allowed);
        assert!(d.retry_after.unwrap() > Duration::ZERO);
        assert_eq!(s.previous_count(), 5);
    }

    #[test]
    fn sliding_recovers_as_previous_window_decays() {
        let t0 = Instant::now();
        let mut s = state(t0, 4);
        for _ in 0..4 {
            assert!(s.admit(t0, WindowStrategy::SlidingCounter).allowed);
        }

        // Halfway through the next window: estimate = 4 × 0.5 = 2, so two more fit.
        let mid = t0 + WINDOW + WINDOW / 2;
        assert!(s.admit(mid, WindowStrategy::SlidingCounter).allowed);
        assert!(s.admit(mid, WindowStrategy::SlidingCounter).allowed);
        assert!(!s.admit(mid, WindowStrategy::SlidingCounter).allowed);
    }

    #[test]
    fn sliding_retry_after_is_when_estimate_fits() {
        let t0 = Instant::now();
        let mut s = state(t0, 4);
        for _ in 0..4 {
            assert!(s.admit(t0, WindowStrategy::SlidingCounter).allowed);
        }

        let d = s.admit(t0 + Duration::from_secs(30), WindowStrategy::SlidingCounter);
        let retry = d.retry_after.unwrap();
        // Roll in 30s, then previous=4 must decay to 3: another 15s.
        assert!((retry.as_secs_f64() - 45.0).abs() < 0.01, "retry was {retry:?}");

        let at = t0 + Duration::from_secs(30) + retry + Duration::from_millis(1);
        assert!(s.admit(at, WindowStrategy::SlidingCounter).allowed);
    }

    #[test]
    fn sliding_forgets_after_two_windows() {
        let t0 = Instant::now();
        let mut s = state(t0, 2);
        s.admit(t0, WindowStrategy::SlidingCounter);
        s.admit(t0, WindowStrategy::SlidingCounter);

        let d = s.admit(t0 + WINDOW * 2, WindowStrategy::SlidingCounter);
        assert!(d.allowed);
        assert_eq!(s.previous_count(), 0);
        assert_eq!(d.remaining, 1);
    }

    #[test]
    fn evictable_only_when_idle_and_spent() {
        let t0 = Instant::now();
        let mut s = state(t0, 2);
        s.admit(t0, WindowStrategy::FixedReset);

        assert!(!s.is_evictable(t0 + WINDOW, Duration::ZERO));
        assert!(!s.is_evictable(t0 + WINDOW * 3, WINDOW * 4));
        assert!(s.is_evictable(t0 + WINDOW * 3, WINDOW * 3));
    }

    #[test]
    fn huge_window_saturates_instead_of_overflowing() {
        let t0 = Instant::now();
        let window = Duration::from_secs(u64::MAX);
        let mut s = RateWindowState::new(t0, NonZeroU32::MIN, window);

        assert!(s.admit(t0, WindowStrategy::SlidingCounter).allowed);
        let d = s.admit(t0 + Duration::from_secs(1), WindowStrategy::SlidingCounter);
        assert!(!d.allowed);
        assert!(d.retry_after_secs().unwrap() > 0);

        let d = s.admit(t0 + Duration::from_secs(1), WindowStrategy::FixedReset);
        assert!(!d.allowed);
        assert!(!s.is_evictable(t0 + Duration::from_secs(3600), Duration::ZERO));
    }

    #[test]
    fn retry_after_secs_rounds_up() {
        let d = Decision::deny(1, Duration::from_millis(1500));
        assert_eq!(d.retry_after_secs(), Some(2));

        let d = Decision::deny(1, Duration::from_millis(1));
        assert_eq!(d.retry_after_secs(), Some(1));

        assert_eq!(Decision::allow(1, 0).retry_after_secs(), None);
    }

    #[test]
    fn strategy_parses() {
        assert_eq!("Fixed".parse::<WindowStrategy>(), Ok(WindowStrategy::FixedReset));
        assert_eq!("sliding".parse::<WindowStrategy>(), Ok(WindowStrategy::SlidingCounter));
        assert!("token_bucket".parse::<WindowStrategy>().is_err());
    }
}
