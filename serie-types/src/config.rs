//! Configuration types shared across the orchestrator, middleware and stores.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default backfill start: 2017-01-01T00:00:00Z, in milliseconds.
pub const DEFAULT_START_MS: i64 = 1_483_228_800_000;

/// Exponential backoff applied between retries of one fetch window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first retry, in milliseconds.
    pub min_backoff_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_backoff_ms: u64,
    /// Exponential factor to increase delay after each failure (>= 1).
    pub factor: u32,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 250,
            max_backoff_ms: 5_000,
            factor: 2,
            jitter_percent: 20,
        }
    }
}

/// Bounded retry policy for a single fetch window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per window including the first one.
    pub max_attempts: u32,
    /// Optional delay between attempts; `None` retries immediately.
    pub backoff: Option<BackoffConfig>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Some(BackoffConfig::default()),
        }
    }
}

/// Token bucket budget shared by every call made to one exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Tokens available per window; each remote call consumes one.
    pub limit: u64,
    /// Refill period of the full budget.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 1200,
            window: Duration::from_secs(60),
        }
    }
}

/// Global configuration for the `Serie` orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Candles requested per window. `None` uses the source's page limit.
    pub page_size: Option<usize>,
    /// Windows of one series fetched concurrently.
    pub window_concurrency: usize,
    /// Series synchronized concurrently within one run.
    pub key_concurrency: usize,
    /// Remote calls in flight per exchange across all series.
    pub exchange_concurrency: usize,
    /// Per-window retry policy.
    pub retry: RetryConfig,
    /// Timeout for an individual remote call.
    pub provider_timeout: Duration,
    /// Optional deadline for a whole `sync` run.
    pub request_timeout: Option<Duration>,
    /// Trailing stored bars re-fetched on resume.
    pub heal_bars: u32,
    /// Backfill start used when a series has no records.
    pub default_start: DateTime<Utc>,
    /// Rebuild a corrupted series from its parseable rows instead of skipping it.
    pub rebuild_corrupted: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: None,
            window_concurrency: 4,
            key_concurrency: 2,
            exchange_concurrency: 4,
            retry: RetryConfig::default(),
            provider_timeout: Duration::from_secs(10),
            request_timeout: None,
            heal_bars: 1,
            default_start: DateTime::from_timestamp_millis(DEFAULT_START_MS).unwrap_or_default(),
            rebuild_corrupted: false,
        }
    }
}
