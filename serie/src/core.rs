use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serie_core::{
    BackoffConfig, CandleSource, MiddlewareStack, RateLimitConfig, RetryConfig, SerieError,
    SeriesKey, SeriesStore, SeriesSummary, SyncConfig, find_gaps,
};
use serie_middleware::SourceBuilder;
use serie_store::CsvStore;
use tokio::sync::{Semaphore, watch};

/// A registered exchange: its (wrapped) source and the permits bounding its
/// concurrent calls across all series.
pub(crate) struct ExchangeHandle {
    pub(crate) source: Arc<dyn CandleSource>,
    pub(crate) stack: MiddlewareStack,
    pub(crate) permits: Arc<Semaphore>,
}

/// Orchestrator that keeps local candle series in sync with exchanges.
pub struct Serie {
    pub(crate) exchanges: HashMap<&'static str, ExchangeHandle>,
    pub(crate) store: Arc<dyn SeriesStore>,
    pub(crate) cfg: SyncConfig,
    pub(crate) shutdown: Arc<watch::Sender<bool>>,
}

/// Cloneable handle that asks running and future syncs of one [`Serie`] to stop.
///
/// After [`trigger`](Self::trigger): windows not yet started are cancelled,
/// in-flight calls finish, interrupted series append nothing and series not
/// yet started are reported `Skipped`.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// True once [`trigger`](Self::trigger) has been called.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Builder for constructing a [`Serie`] orchestrator.
pub struct SerieBuilder {
    sources: Vec<Arc<dyn CandleSource>>,
    rate_limit: Option<RateLimitConfig>,
    per_exchange_rate_limit: HashMap<String, RateLimitConfig>,
    cooldown: Option<Duration>,
    store: Option<Arc<dyn SeriesStore>>,
    cfg: SyncConfig,
}

impl Default for SerieBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SerieBuilder {
    /// Create a new builder with default [`SyncConfig`].
    ///
    /// Starts with no sources and no store; register both before [`build`](Self::build).
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: vec![],
            rate_limit: None,
            per_exchange_rate_limit: HashMap::new(),
            cooldown: None,
            store: None,
            cfg: SyncConfig::default(),
        }
    }

    /// Register the source of one exchange. The source's `name()` is the exchange id.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn CandleSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Apply a token-bucket rate limit to every registered exchange.
    ///
    /// Each exchange gets its own bucket; all series of that exchange share it.
    #[must_use]
    pub fn with_rate_limit(mut self, cfg: RateLimitConfig) -> Self {
        self.rate_limit = Some(cfg);
        self
    }

    /// Apply a rate limit to one exchange, overriding [`with_rate_limit`](Self::with_rate_limit).
    #[must_use]
    pub fn with_exchange_rate_limit(mut self, exchange: &str, cfg: RateLimitConfig) -> Self {
        self.per_exchange_rate_limit
            .insert(exchange.to_string(), cfg);
        self
    }

    /// Pause all calls to an exchange after it answers `RateLimited`.
    ///
    /// `default_cooldown` applies when the exchange gives no retry hint.
    #[must_use]
    pub const fn with_cooldown(mut self, default_cooldown: Duration) -> Self {
        self.cooldown = Some(default_cooldown);
        self
    }

    /// Persist series in `store`.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn SeriesStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Persist series as CSV files under `root`.
    #[must_use]
    pub fn csv_root(self, root: impl Into<PathBuf>) -> Self {
        self.store(Arc::new(CsvStore::new(root)))
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, cfg: SyncConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Candles requested per window; capped by the source's page limit.
    #[must_use]
    pub const fn page_size(mut self, page: usize) -> Self {
        self.cfg.page_size = Some(page);
        self
    }

    /// Windows of one series fetched concurrently.
    #[must_use]
    pub const fn window_concurrency(mut self, n: usize) -> Self {
        self.cfg.window_concurrency = n;
        self
    }

    /// Series synchronized concurrently within one run.
    #[must_use]
    pub const fn key_concurrency(mut self, n: usize) -> Self {
        self.cfg.key_concurrency = n;
        self
    }

    /// Remote calls in flight per exchange, across all series.
    #[must_use]
    pub const fn exchange_concurrency(mut self, n: usize) -> Self {
        self.cfg.exchange_concurrency = n;
        self
    }

    /// Per-window retry policy.
    #[must_use]
    pub const fn retry(mut self, retry: RetryConfig) -> Self {
        self.cfg.retry = retry;
        self
    }

    /// Attempts per window, including the first.
    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.cfg.retry.max_attempts = attempts;
        self
    }

    /// Delay between attempts; `None` retries immediately.
    #[must_use]
    pub const fn backoff(mut self, backoff: Option<BackoffConfig>) -> Self {
        self.cfg.retry.backoff = backoff;
        self
    }

    /// Timeout for each individual remote call.
    #[must_use]
    pub const fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.provider_timeout = timeout;
        self
    }

    /// Deadline for a whole sync run; when exceeded, remaining work is skipped.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.request_timeout = Some(timeout);
        self
    }

    /// Trailing stored bars re-fetched when resuming.
    #[must_use]
    pub const fn heal_bars(mut self, bars: u32) -> Self {
        self.cfg.heal_bars = bars;
        self
    }

    /// Default backfill start for series without records.
    #[must_use]
    pub const fn default_start(mut self, start: DateTime<Utc>) -> Self {
        self.cfg.default_start = start;
        self
    }

    /// Rebuild corrupted series from their parseable rows instead of failing them.
    #[must_use]
    pub const fn rebuild_corrupted(mut self, yes: bool) -> Self {
        self.cfg.rebuild_corrupted = yes;
        self
    }

    /// Build the `Serie` orchestrator.
    ///
    /// # Errors
    /// Returns `InvalidArg` if no source or no store is registered, if two
    /// sources share a name, or if a concurrency, page size or attempt count is zero.
    pub fn build(self) -> Result<Serie, SerieError> {
        if self.sources.is_empty() {
            return Err(SerieError::InvalidArg(
                "no sources registered; add at least one via with_source(...)".to_string(),
            ));
        }
        let Some(store) = self.store else {
            return Err(SerieError::InvalidArg(
                "no store configured; use store(...) or csv_root(...)".to_string(),
            ));
        };
        let cfg = self.cfg;
        if cfg.window_concurrency == 0 || cfg.key_concurrency == 0 || cfg.exchange_concurrency == 0
        {
            return Err(SerieError::InvalidArg(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        if cfg.page_size == Some(0) {
            return Err(SerieError::InvalidArg("page_size must be at least 1".to_string()));
        }
        if cfg.retry.max_attempts == 0 {
            return Err(SerieError::InvalidArg(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        let mut exchanges = HashMap::new();
        for raw in self.sources {
            let name = raw.name();
            let mut layers = SourceBuilder::new(raw).with_timeout(cfg.provider_timeout);
            if let Some(rl) = self
                .per_exchange_rate_limit
                .get(name)
                .or(self.rate_limit.as_ref())
            {
                layers = layers.with_rate_limit(rl);
            }
            if let Some(cooldown) = self.cooldown {
                layers = layers.with_cooldown(cooldown);
            }
            let stack = layers.describe();
            #[cfg(feature = "tracing")]
            tracing::debug!(
                target: "serie::core",
                exchange = name,
                layers = ?stack.names(),
                "registered source"
            );
            let handle = ExchangeHandle {
                stack,
                source: layers.build(),
                permits: Arc::new(Semaphore::new(cfg.exchange_concurrency)),
            };
            if exchanges.insert(name, handle).is_some() {
                return Err(SerieError::InvalidArg(format!(
                    "duplicate source '{name}'"
                )));
            }
        }

        let (tx, _rx) = watch::channel(false);
        Ok(Serie {
            exchanges,
            store,
            cfg,
            shutdown: Arc::new(tx),
        })
    }
}

impl Serie {
    /// Start building a new `Serie` instance.
    ///
    /// ```rust,ignore
    /// use std::sync::Arc;
    /// use serie::{RateLimitConfig, Serie};
    ///
    /// let serie = Serie::builder()
    ///     .with_source(Arc::new(BinanceSource::new()))
    ///     .with_rate_limit(RateLimitConfig::default())
    ///     .csv_root("data")
    ///     .build()?;
    /// ```
    #[must_use]
    pub fn builder() -> SerieBuilder {
        SerieBuilder::new()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.cfg
    }

    /// The store series are persisted in.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SeriesStore> {
        &self.store
    }

    /// The wrapped source registered for `exchange`, if any.
    #[must_use]
    pub fn source(&self, exchange: &str) -> Option<&Arc<dyn CandleSource>> {
        self.exchanges.get(exchange).map(|h| &h.source)
    }

    /// Middleware layers wrapping one exchange's source, outermost first.
    #[must_use]
    pub fn source_stack(&self, exchange: &str) -> Option<&MiddlewareStack> {
        self.exchanges.get(exchange).map(|h| &h.stack)
    }

    /// Registered exchange ids, sorted.
    #[must_use]
    pub fn exchanges(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.exchanges.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn exchange(&self, name: &str) -> Result<&ExchangeHandle, SerieError> {
        self.exchanges
            .get(name)
            .ok_or_else(|| SerieError::unknown_exchange(name))
    }

    /// Handle to request a graceful shutdown of running syncs.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown),
        }
    }

    /// Every stored series with its row count and time bounds.
    ///
    /// # Errors
    /// Propagates store enumeration failures.
    pub fn inventory(&self) -> Result<Vec<SeriesSummary>, SerieError> {
        self.store.inventory()
    }

    /// Holes in the stored series between `from_ts` and `to_ts`, as `[start, end)` pairs.
    ///
    /// # Errors
    /// Propagates store read failures, including `StoreCorrupted`.
    pub fn gaps(
        &self,
        key: &SeriesKey,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<Vec<(i64, i64)>, SerieError> {
        let candles = self.store.load(key, from_ts, to_ts)?;
        Ok(find_gaps(&candles, key.interval))
    }
}
