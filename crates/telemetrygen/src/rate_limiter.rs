//! Rate Limiting Abstractions
//!
//! Each worker owns one limiter; limiters are never shared, so the aggregate
//! emission rate of a run is `workers × rate`.
//!
//! The bundled [`TokenBucketLimiter`] is a token bucket with a capacity of one
//! permit: the first `acquire()` is granted immediately and every later one no
//! sooner than `1 / rate` after the previous grant. A worker that falls behind
//! (slow export) gets its next permit immediately but never a catch-up burst.

use crate::error::PacingError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Effective emission rate of a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RateLimit {
    /// No pacing; permits are granted as fast as they are requested.
    Unlimited,
    /// At most this many permits per second.
    PerSecond(f64),
}

impl RateLimit {
    /// Maps a configured rate to a limit; `0` means unlimited.
    pub fn from_rate(rate_per_sec: f64) -> Self {
        if rate_per_sec > 0.0 {
            Self::PerSecond(rate_per_sec)
        } else {
            Self::Unlimited
        }
    }

    /// Minimum spacing between two permits.
    ///
    /// `None` when unlimited, and also when `1/rate` does not fit a
    /// `Duration` or rounds down to zero; such a limit never waits.
    pub fn period(self) -> Option<Duration> {
        match self {
            Self::Unlimited => None,
            Self::PerSecond(rate) => Duration::try_from_secs_f64(1.0 / rate)
                .ok()
                .filter(|period| !period.is_zero()),
        }
    }

    pub fn per_second(self) -> Option<f64> {
        match self {
            Self::Unlimited => None,
            Self::PerSecond(rate) => Some(rate),
        }
    }
}

/// Trait for pacing async operations.
///
/// Implementors control the pacing of operations by awaiting `acquire()`
/// before each one. Uses native async fn in traits.
///
/// # Example
///
/// ```ignore
/// let mut limiter = TokenBucketLimiter::from_rate(100.0); // 100 ops/sec
/// loop {
///     limiter.acquire().await?;
///     do_work();
/// }
/// ```
///
/// # Note on Send bounds
///
/// The `+ Send` bound on the return type lets the future run on the
/// multi-threaded Tokio runtime; `async fn` in traits doesn't add it.
pub trait RateLimiter: Send {
    /// Waits until the next operation is permitted.
    fn acquire(&mut self) -> impl Future<Output = Result<(), PacingError>> + Send;

    /// Returns the target rate in operations per second, if limited.
    fn target_rate(&self) -> Option<f64> {
        None
    }
}

/// Object-safe version of RateLimiter for dynamic dispatch.
pub trait RateLimiterBoxed: Send {
    fn acquire_boxed(&mut self) -> Pin<Box<dyn Future<Output = Result<(), PacingError>> + Send + '_>>;

    fn target_rate(&self) -> Option<f64> {
        None
    }
}

/// Blanket implementation: any RateLimiter can be used as RateLimiterBoxed
impl<T: RateLimiter> RateLimiterBoxed for T {
    fn acquire_boxed(&mut self) -> Pin<Box<dyn Future<Output = Result<(), PacingError>> + Send + '_>> {
        Box::pin(self.acquire())
    }

    fn target_rate(&self) -> Option<f64> {
        RateLimiter::target_rate(self)
    }
}

/// Burst-1 token bucket driven by `tokio::time::Interval`.
///
/// The interval is created on the first `acquire()`, so a limiter can be
/// built outside the runtime and the first permit is always immediate.
pub struct TokenBucketLimiter {
    limit: RateLimit,
    interval: Option<Interval>,
}

impl TokenBucketLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            interval: None,
        }
    }

    /// Create a limiter from a target rate in operations per second.
    ///
    /// A rate of zero (or below) yields an unlimited limiter.
    pub fn from_rate(rate_per_sec: f64) -> Self {
        Self::new(RateLimit::from_rate(rate_per_sec))
    }

    /// Create an unlimited limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(RateLimit::Unlimited)
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }
}

impl RateLimiter for TokenBucketLimiter {
    async fn acquire(&mut self) -> Result<(), PacingError> {
        let Some(period) = self.limit.period() else {
            // Unlimited: just yield so a tight loop can't starve the runtime
            tokio::task::yield_now().await;
            return Ok(());
        };

        let ticker = self.interval.get_or_insert_with(|| {
            let mut ticker = interval(period);
            // Delay, not Skip: after a late tick the next one is a full
            // period away, which is what keeps the bucket at one token.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;
        Ok(())
    }

    fn target_rate(&self) -> Option<f64> {
        self.limit.per_second()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_token_bucket_spacing() {
        let mut limiter = TokenBucketLimiter::from_rate(100.0); // 10ms period

        let start = Instant::now();
        let mut grants = Vec::new();
        for _ in 0..10 {
            limiter.acquire().await.unwrap();
            grants.push(Instant::now());
        }

        // First permit is immediate
        assert_eq!(grants[0], start);
        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(10));
        }
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_burst_after_slow_iteration() {
        let mut limiter = TokenBucketLimiter::from_rate(10.0); // 100ms period
        limiter.acquire().await.unwrap();

        // Simulate an export that takes 3.5 periods
        tokio::time::sleep(Duration::from_millis(350)).await;

        let late = Instant::now();
        limiter.acquire().await.unwrap();
        assert_eq!(Instant::now(), late, "late permit should be immediate");

        limiter.acquire().await.unwrap();
        assert!(
            Instant::now() - late >= Duration::from_millis(100),
            "no catch-up burst after a late permit"
        );
    }

    #[tokio::test]
    async fn test_unlimited_rate_limiter() {
        let mut limiter = TokenBucketLimiter::unlimited();

        let start = std::time::Instant::now();
        for _ in 0..1000 {
            limiter.acquire().await.unwrap();
        }
        let elapsed = start.elapsed();

        // Should be very fast - just yielding
        assert!(
            elapsed < Duration::from_millis(50),
            "Unlimited limiter too slow: {:?}",
            elapsed
        );
    }

    #[test]
    fn test_zero_rate_is_unlimited() {
        assert_eq!(RateLimit::from_rate(0.0), RateLimit::Unlimited);
        assert_eq!(RateLimit::from_rate(2.5), RateLimit::PerSecond(2.5));
        assert_eq!(RateLimit::PerSecond(4.0).period(), Some(Duration::from_millis(250)));
        assert_eq!(RateLimit::Unlimited.period(), None);
    }

    #[tokio::test]
    async fn test_sub_nanosecond_period_never_waits() {
        // 1/1e10 s rounds down to a zero Duration
        assert_eq!(RateLimit::PerSecond(1e10).period(), None);
        assert_eq!(RateLimit::PerSecond(f64::MIN_POSITIVE).period(), None);

        let mut limiter = TokenBucketLimiter::from_rate(1e10);
        for _ in 0..10 {
            limiter.acquire().await.unwrap();
        }
        assert_eq!(RateLimiter::target_rate(&limiter), Some(1e10));
    }

    #[test]
    fn test_target_rate() {
        let limiter = TokenBucketLimiter::from_rate(250.0);
        // Disambiguate between RateLimiter and RateLimiterBoxed traits
        assert_eq!(RateLimiter::target_rate(&limiter), Some(250.0));

        let unlimited = TokenBucketLimiter::unlimited();
        assert_eq!(RateLimiter::target_rate(&unlimited), None);
    }

    #[tokio::test]
    async fn test_boxed_limiter() {
        let mut limiter: Box<dyn RateLimiterBoxed> = Box::new(TokenBucketLimiter::unlimited());
        limiter.acquire_boxed().await.unwrap();
        assert_eq!(limiter.target_rate(), None);
    }
}
