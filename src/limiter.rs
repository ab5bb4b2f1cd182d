//! Fixed-window rate limiter shared by a connector's outbound calls.
//!
//! Policy: a window of `window` starting at the first grant after a reset;
//! at most `limit` permits are granted per window. `try_acquire` is the
//! non-blocking check; `acquire` queues callers FIFO and sleeps until the
//! window rolls over.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    limit: u32,
    window: Duration,
    inner: Mutex<Window>,
    /// Serializes blocking acquirers. Tokio mutexes are fair, so waiters
    /// are granted in submission order.
    queue: tokio::sync::Mutex<()>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        assert!(limit > 0, "rate limit must be positive");
        Self {
            limit,
            window,
            inner: Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            }),
            queue: tokio::sync::Mutex::new(()),
        }
    }

    /// Convenience for "n permits per second".
    pub fn per_second(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(1))
    }

    /// Non-blocking check; grants a permit if the current window has room.
    pub fn try_acquire(&self) -> bool {
        let mut win = self.inner.lock();
        let now = Instant::now();
        if now.duration_since(win.started) >= self.window {
            win.started = now;
            win.count = 0;
        }
        if win.count < self.limit {
            win.count += 1;
            true
        } else {
            false
        }
    }

    /// Suspends the caller until a permit is free. Callers are served in
    /// submission order.
    pub async fn acquire(&self) {
        let _guard = self.queue.lock().await;
        loop {
            let wait = {
                let mut win = self.inner.lock();
                let now = Instant::now();
                if now.duration_since(win.started) >= self.window {
                    win.started = now;
                    win.count = 0;
                }
                if win.count < self.limit {
                    win.count += 1;
                    None
                } else {
                    // Window is full; sleep out its remainder.
                    Some(self.window - now.duration_since(win.started))
                }
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_try_acquire_denies_over_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_reset_restores_permits() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_delays_excess_caller() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(1)));
        limiter.acquire().await;
        limiter.acquire().await;

        // Third caller must not be granted inside the same window.
        let l = Arc::clone(&limiter);
        let waiter = tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            l.acquire().await;
            start.elapsed()
        });

        let waited = waiter.await.unwrap();
        assert!(waited >= Duration::from_millis(900), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_is_fifo() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_millis(100)));
        limiter.acquire().await;

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..3 {
            let l = Arc::clone(&limiter);
            let o = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                l.acquire().await;
                o.lock().push(i);
            }));
            // Let each task reach the queue before spawning the next.
            tokio::task::yield_now().await;
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }
}
