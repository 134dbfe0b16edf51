//! Serie data transfer objects, catalogs and configuration primitives.
#![warn(missing_docs)]

mod candle;
mod config;
mod error;
mod exchange;
/// Interval catalog and name-based lookups.
pub mod interval;
mod middleware;
mod reports;
mod series;

pub use candle::Candle;
pub use config::{BackoffConfig, DEFAULT_START_MS, RateLimitConfig, RetryConfig, SyncConfig};
pub use error::SerieError;
pub use exchange::{DEFAULT_PAGE_LIMIT, Exchange};
pub use interval::Interval;
pub use middleware::{MiddlewareLayer, MiddlewareStack};
pub use reports::{SeriesSummary, SyncResult, SyncStatus, WindowFailure};
pub use series::{FetchWindow, SeriesKey};

pub use rust_decimal::Decimal;
