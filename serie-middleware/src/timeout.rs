use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use serie_core::{Candle, CandleSource, Interval, Middleware, SerieError};

/// Source wrapper that bounds each call to the wrapped source.
///
/// Sits directly on the raw source, so waits in outer layers (tokens,
/// cooldowns) never count against the timeout. Expiry is reported as
/// `SerieError::Timeout` naming the source.
pub struct TimeoutSource {
    inner: Arc<dyn CandleSource>,
    timeout: Duration,
}

impl TimeoutSource {
    /// Wrap `inner` so every call fails with `Timeout` after `timeout`.
    #[must_use]
    pub fn new(inner: Arc<dyn CandleSource>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

#[async_trait]
impl CandleSource for TimeoutSource {
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
        tokio::time::timeout(
            self.timeout,
            self.inner.fetch_candles(symbol, interval, since, limit),
        )
        .await
        .unwrap_or_else(|_| {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                target: "serie::middleware",
                source = self.inner.name(),
                timeout_ms = self.timeout_ms(),
                "call timed out"
            );
            Err(SerieError::Timeout {
                connector: self.inner.name().to_string(),
                timeout_ms: self.timeout_ms(),
            })
        })
    }
}

/// Middleware that wraps a source in a [`TimeoutSource`].
pub struct TimeoutMiddleware {
    timeout: Duration,
}

impl TimeoutMiddleware {
    /// Create the middleware.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Middleware for TimeoutMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn CandleSource>) -> Arc<dyn CandleSource> {
        Arc::new(TimeoutSource::new(inner, self.timeout))
    }

    fn name(&self) -> &'static str {
        "TimeoutSource"
    }

    fn config_json(&self) -> serde_json::Value {
        json!({
            "timeout_ms": u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        })
    }
}
