use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use serie_core::{Candle, CandleSource, Interval, Middleware, SerieError};
use tokio::time::Instant;

/// Pause applied when the exchange throttles without saying for how long.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// Source wrapper that pauses every caller after the exchange answers `RateLimited`.
///
/// The error itself is passed through unchanged so the caller's retry policy
/// still applies; only the next calls are delayed.
pub struct CooldownSource {
    inner: Arc<dyn CandleSource>,
    // cooling-down-until; None means open
    state: Mutex<Option<Instant>>,
    default_cooldown: Duration,
}

impl CooldownSource {
    /// Wrap `inner`; `default_cooldown` applies when no `retry_after_ms` hint is given.
    #[must_use]
    pub fn new(inner: Arc<dyn CandleSource>, default_cooldown: Duration) -> Self {
        Self {
            inner,
            state: Mutex::new(None),
            default_cooldown,
        }
    }

    /// Instant until which calls are held back, if cooling down.
    #[must_use]
    pub fn cooling_until(&self) -> Option<Instant> {
        let mut guard = self.state.lock().expect("mutex poisoned");
        if let Some(until) = *guard {
            if Instant::now() < until {
                return Some(until);
            }
            // expired
            *guard = None;
        }
        None
    }

    fn cool_down(&self, duration: Duration) {
        let until = Instant::now() + duration;
        let mut guard = self.state.lock().expect("mutex poisoned");
        // Never shorten an active cooldown.
        if guard.is_none_or(|current| current < until) {
            *guard = Some(until);
        }
    }

    fn handle_error(&self, err: SerieError) -> SerieError {
        if let SerieError::RateLimited { retry_after_ms, .. } = &err {
            let duration = retry_after_ms.map_or(self.default_cooldown, Duration::from_millis);
            #[cfg(feature = "tracing")]
            tracing::debug!(
                target: "serie::middleware",
                source = self.inner.name(),
                cooldown_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                "throttled; cooling down"
            );
            self.cool_down(duration);
        }
        err
    }
}

#[async_trait]
impl CandleSource for CooldownSource {
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
        while let Some(until) = self.cooling_until() {
            tokio::time::sleep_until(until).await;
        }
        self.inner
            .fetch_candles(symbol, interval, since, limit)
            .await
            .map_err(|e| self.handle_error(e))
    }
}

/// Middleware that wraps a source in a [`CooldownSource`].
pub struct CooldownMiddleware {
    default_cooldown: Duration,
}

impl CooldownMiddleware {
    /// Create the middleware.
    #[must_use]
    pub const fn new(default_cooldown: Duration) -> Self {
        Self { default_cooldown }
    }
}

impl Middleware for CooldownMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn CandleSource>) -> Arc<dyn CandleSource> {
        Arc::new(CooldownSource::new(inner, self.default_cooldown))
    }

    fn name(&self) -> &'static str {
        "CooldownSource"
    }

    fn config_json(&self) -> serde_json::Value {
        json!({
            "default_cooldown_ms": u64::try_from(self.default_cooldown.as_millis()).unwrap_or(u64::MAX),
        })
    }
}
