use fnv::FnvHashMap;
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::oneshot;

struct Waiter {
    tx: oneshot::Sender<()>,
}

struct Inner {
    capacity: usize,
    tokens: usize,
    interval: Duration,
    last_refill: Instant,
    waiters: VecDeque<Waiter>,
}

impl Inner {
    fn refill(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_refill) >= self.interval {
            self.last_refill = now;
            self.tokens = self.capacity;
            while self.tokens > 0 {
                if let Some(waiter) = self.waiters.pop_front() {
                    self.tokens -= 1;
                    let _ = waiter.tx.send(());
                } else {
                    break;
                }
            }
        }
    }
}

/// Token bucket rate limiter allowing `capacity` operations every `interval`.
///
/// Safe for concurrent callers: a caller finding the bucket empty parks on a queue and is woken
/// in FIFO order by the next refill.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RateLimiter")
            .field("capacity", &inner.capacity)
            .field("tokens", &inner.tokens)
            .field("interval", &inner.interval)
            .finish()
    }
}

impl RateLimiter {
    /// Construct a new [`RateLimiter`] allowing `capacity` operations every `interval`.
    pub fn new(capacity: usize, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                capacity,
                tokens: capacity,
                interval,
                last_refill: Instant::now(),
                waiters: VecDeque::new(),
            })),
        }
    }

    /// Acquire a permit, awaiting the next refill if the bucket is empty.
    pub async fn acquire(&self) {
        loop {
            let rx = {
                let mut inner = self.inner.lock();
                inner.refill();
                if inner.tokens > 0 {
                    inner.tokens -= 1;
                    None
                } else {
                    let (tx, rx) = oneshot::channel();
                    inner.waiters.push_back(Waiter { tx });
                    Some((rx, inner.interval))
                }
            };
            match rx {
                None => return,
                Some((rx, interval)) => {
                    // Refills only happen when a caller observes the elapsed interval, so
                    // bound the wait rather than relying on another caller arriving.
                    let _ = tokio::time::timeout(interval, rx).await;
                }
            }
        }
    }
}

/// Set of [`RateLimiter`]s keyed by host, so concurrent REST traffic to different venues never
/// contends on one bucket.
#[derive(Debug, Default, Clone)]
pub struct RateLimiterMap {
    limiters: Arc<Mutex<FnvHashMap<SmolStr, RateLimiter>>>,
}

impl RateLimiterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the [`RateLimiter`] for the provided host, creating it with the provided settings
    /// on first use.
    pub fn for_host(&self, host: &str, capacity: usize, interval: Duration) -> RateLimiter {
        let mut limiters = self.limiters.lock();
        limiters
            .entry(SmolStr::from(host))
            .or_insert_with(|| RateLimiter::new(capacity, interval))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_rate_limit_basic() {
        let rl = RateLimiter::new(2, Duration::from_millis(50));
        rl.acquire().await;
        rl.acquire().await;
        let start = Instant::now();
        rl.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_rate_limiter_map_shares_bucket_per_host() {
        let map = RateLimiterMap::new();
        let a = map.for_host("api.example.com", 1, Duration::from_millis(50));
        let b = map.for_host("api.example.com", 1, Duration::from_millis(50));

        a.acquire().await;
        let start = Instant::now();
        b.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
