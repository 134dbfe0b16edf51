//! Re-export of foundational types from `serie-types`.
// Consolidated re-exports so downstream crates can depend on `serie-core` only

pub use serie_types::interval;
pub use serie_types::{
    BackoffConfig, Candle, DEFAULT_PAGE_LIMIT, DEFAULT_START_MS, Decimal, Exchange, FetchWindow,
    Interval, MiddlewareLayer, MiddlewareStack, RateLimitConfig, RetryConfig, SerieError,
    SeriesKey, SeriesSummary, SyncConfig, SyncResult, SyncStatus, WindowFailure,
};
