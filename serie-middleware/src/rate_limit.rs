//! Token-bucket rate limiting for candle sources.
//!
//! One [`RateLimiter`] is shared by every worker that talks to the same
//! exchange. [`RateLimiter::acquire`] never fails: it suspends the caller until
//! a token is available, so throttling shows up as latency rather than errors.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use serie_core::{Candle, CandleSource, Interval, Middleware, RateLimitConfig, SerieError};
use tokio::time::Instant;

/// Token bucket holding at most `limit` tokens, refilled continuously over `window`.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    /// Tokens added per second.
    rate: f64,
    config: RateLimitConfig,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl RateLimiter {
    /// Create a full bucket from `config`.
    ///
    /// A zero `limit` or `window` is clamped to one token per millisecond-long window.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        let limit = config.limit.max(1);
        let window = config.window.max(Duration::from_millis(1));
        #[allow(clippy::cast_precision_loss)]
        let capacity = limit as f64;
        Self {
            capacity,
            rate: capacity / window.as_secs_f64(),
            config,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                refilled_at: Instant::now(),
            }),
        }
    }

    /// Configuration this limiter was built from.
    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.refilled_at);
        bucket.tokens = elapsed
            .as_secs_f64()
            .mul_add(self.rate, bucket.tokens)
            .min(self.capacity);
        bucket.refilled_at = now;
    }

    /// Take one token if available, otherwise report how long until one is.
    fn take(&self) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock().expect("mutex poisoned");
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }
        let missing = 1.0 - bucket.tokens;
        Err(Duration::from_secs_f64(missing / self.rate).max(Duration::from_millis(1)))
    }

    /// Take a token without waiting.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        self.take().is_ok()
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) {
        loop {
            match self.take() {
                Ok(()) => return,
                Err(wait) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(
                        target: "serie::middleware",
                        wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                        "rate limit: waiting for token"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Whole tokens currently available.
    #[must_use]
    pub fn available(&self) -> u64 {
        let mut bucket = self.bucket.lock().expect("mutex poisoned");
        self.refill(&mut bucket);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let whole = bucket.tokens.floor() as u64;
        whole
    }
}

/// Source wrapper that takes a token from a shared [`RateLimiter`] before every call.
pub struct RateLimitedSource {
    inner: Arc<dyn CandleSource>,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedSource {
    /// Wrap `inner` with a dedicated limiter built from `config`.
    #[must_use]
    pub fn new(inner: Arc<dyn CandleSource>, config: RateLimitConfig) -> Self {
        Self::with_limiter(inner, Arc::new(RateLimiter::new(config)))
    }

    /// Wrap `inner` with an existing, possibly shared, limiter.
    #[must_use]
    pub const fn with_limiter(inner: Arc<dyn CandleSource>, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    /// The limiter guarding this source.
    #[must_use]
    pub const fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

#[async_trait]
impl CandleSource for RateLimitedSource {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn page_limit(&self) -> usize {
        self.inner.page_limit()
    }

    fn supported_intervals(&self) -> &'static [Interval] {
        self.inner.supported_intervals()
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        since: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, SerieError> {
        self.limiter.acquire().await;
        self.inner
            .fetch_candles(symbol, interval, since, limit)
            .await
    }
}

/// Middleware that wraps a source in a [`RateLimitedSource`].
pub struct RateLimitMiddleware {
    config: RateLimitConfig,
}

impl RateLimitMiddleware {
    /// Create the middleware.
    #[must_use]
    pub const fn new(config: RateLimitConfig) -> Self {
        Self { config }
    }
}

impl Middleware for RateLimitMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn CandleSource>) -> Arc<dyn CandleSource> {
        Arc::new(RateLimitedSource::new(inner, self.config))
    }

    fn name(&self) -> &'static str {
        "RateLimitedSource"
    }

    fn config_json(&self) -> serde_json::Value {
        json!({
            "limit": self.config.limit,
            "window_ms": u64::try_from(self.config.window.as_millis()).unwrap_or(u64::MAX),
        })
    }
}
