//! Background eviction of idle rate-limit keys.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::limiter::RateLimiter;

/// Handle to a running sweeper. Dropping it stops the task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Request shutdown and wait for the task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Spawn a tokio task that calls `purge_idle` every `every`.
///
/// The task holds only a weak reference and exits once the limiter is dropped.
/// Must be called from within a tokio runtime.
pub fn spawn_sweeper(limiter: &Arc<RateLimiter>, every: Duration) -> SweeperHandle {
    let limiter: Weak<RateLimiter> = Arc::downgrade(limiter);
    let (tx, mut rx) = oneshot::channel::<()>();

    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut rx => break,
                _ = ticker.tick() => {
                    let Some(limiter) = limiter.upgrade() else { break };
                    let evicted = limiter.purge_idle();
                    if evicted > 0 {
                        debug!(evicted, remaining = limiter.tracked_keys(), "evicted idle rate-limit keys");
                    }
                }
            }
        }

        info!("rate-limit sweeper stopped");
    });

    SweeperHandle {
        shutdown: Some(tx),
        join: Some(join),
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::time::Instant;

    use ridelink_core::ClientKey;

    use super::*;
    use crate::clock::ManualClock;
    use crate::rate_limit::RateLimiterConfig;

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_idle_keys() {
        let clock = ManualClock::new(Instant::now());
        let config = RateLimiterConfig::new(NonZeroU32::MIN, Duration::from_secs(10));
        let limiter = Arc::new(RateLimiter::new(config).with_clock(Arc::new(clock.clone())));
        limiter.check(&ClientKey::from("k"));

        let handle = spawn_sweeper(&limiter, Duration::from_secs(1));
        clock.advance(Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(limiter.tracked_keys(), 0);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_when_limiter_dropped() {
        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::default()));
        let mut handle = spawn_sweeper(&limiter, Duration::from_millis(100));
        drop(limiter);

        tokio::time::sleep(Duration::from_millis(250)).await;
        let join = handle.join.take().unwrap();
        assert!(join.await.is_ok());
    }
}
