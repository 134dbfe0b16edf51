//! Serie keeps local OHLCV candle series in sync with exchange history endpoints.
//!
//! Overview
//! - Each (exchange, symbol, interval) series is stored append-only with strictly
//!   increasing timestamps through a [`SeriesStore`] (CSV files by default).
//! - A sync pass finds where every series resumes, fetches the missing range in
//!   paginated windows through the exchange's [`CandleSource`], merges the pages
//!   and appends them as one batch.
//! - Failures are contained per series and reported in [`SyncResult`]s.
//!
//! Key behaviors and trade-offs
//! - Resume overlap: the last `heal_bars` stored bars are re-fetched on every
//!   resume. Re-fetched values are compared with the stored rows and counted in
//!   `SyncResult::revised`; stored rows are never rewritten.
//! - Gap-free commits: when some windows exhaust their retries, only candles before
//!   the earliest failed window are stored (`PartialFailure`); the next run resumes
//!   exactly at the hole.
//! - Throttling: one token bucket and one concurrency semaphore per exchange are
//!   shared by every series of that exchange. `RateLimited` answers put the whole
//!   exchange on cooldown when configured.
//! - Shutdown: a [`ShutdownHandle`] stops new windows; interrupted series append
//!   nothing and are reported `Skipped`.
//!
//! Examples
//! Building an orchestrator:
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use serie::{RateLimitConfig, Serie};
//!
//! let serie = Serie::builder()
//!     .with_source(Arc::new(BinanceSource::new()))
//!     .with_rate_limit(RateLimitConfig { limit: 1200, window: Duration::from_secs(60) })
//!     .with_cooldown(Duration::from_secs(5))
//!     .csv_root("data")
//!     .build()?;
//! ```
//!
//! Running a sync:
//! ```rust,ignore
//! let results = serie
//!     .sync_builder("binance")
//!     .symbols(&["BTC/USDT", "ETH/USDT"])?
//!     .intervals(&["1h", "1d"])?
//!     .run()
//!     .await?;
//! for key in serie::failed_keys(&results) {
//!     eprintln!("retry later: {key}");
//! }
//! ```
//!
//! See `serie/examples/` for a runnable demonstration against a mock exchange.
#![warn(missing_docs)]

pub(crate) mod core;
mod sync;

pub use core::{Serie, SerieBuilder, ShutdownHandle};
pub use sync::builder::SyncBuilder;
pub use sync::gap::{ResumeDecision, resume_point};
pub use sync::scheduler::{FetchOutcome, plan_windows};
pub use sync::util::{backoff_delay, failed_keys, summarize_failures, with_request_deadline};
pub use sync::window::{WindowState, WindowTask};

pub use serie_middleware::{
    CooldownMiddleware, RateLimitMiddleware, RateLimiter, SourceBuilder, TimeoutMiddleware,
};
pub use serie_store::{CsvStore, MemoryStore};

// Re-export core types for convenience
pub use serie_core::{
    BackoffConfig, Candle, CandleSource, DEFAULT_PAGE_LIMIT, DEFAULT_START_MS, Decimal, Exchange,
    FetchWindow, Interval, Middleware, MiddlewareLayer, MiddlewareStack, RateLimitConfig,
    RetryConfig, SerieError, SeriesKey, SeriesStore, SeriesSummary, SyncConfig, SyncResult,
    SyncStatus, WindowFailure, find_gaps,
};
