use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the serie workspace.
///
/// Variants fall in three groups: configuration errors detected before any I/O
/// (`UnknownInterval`, `UnknownExchange`, `InvalidArg`, `Unsupported`), remote
/// failures reported by a candle source (`RateLimited`, `Transient`, `Timeout`,
/// `NotFound`, `Auth`, `Connector`) and local storage failures (`StoreCorrupted`,
/// `Io`).
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SerieError {
    /// The interval name is not registered in the interval catalog.
    #[error("unknown interval: {name}")]
    UnknownInterval {
        /// The rejected interval name, e.g. "3h".
        name: String,
    },

    /// The exchange has not been registered with the orchestrator.
    #[error("unknown exchange: {name}")]
    UnknownExchange {
        /// The rejected exchange identifier.
        name: String,
    },

    /// The requested operation is not available on the target source.
    #[error("unsupported: {what}")]
    Unsupported {
        /// What was requested, e.g. "interval 1M on bitfinex".
        what: String,
    },

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// The remote source rejected the call because of its rate limit.
    #[error("rate limited by {connector} (retry_after_ms={retry_after_ms:?})")]
    RateLimited {
        /// Source that rejected the call.
        connector: String,
        /// Optional hint from the exchange on when to retry.
        retry_after_ms: Option<u64>,
    },

    /// A transient remote failure (network hiccup, 5xx, malformed page).
    #[error("transient failure: {0}")]
    Transient(String),

    /// An individual remote call exceeded the configured timeout.
    #[error("{connector} timed out after {timeout_ms}ms")]
    Timeout {
        /// Source that timed out.
        connector: String,
        /// Timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// A symbol or market could not be found on the remote source.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource, e.g. "market DOGE/EUR".
        what: String,
    },

    /// The remote source refused the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// An individual connector returned an opaque error.
    #[error("{connector} failed: {msg}")]
    Connector {
        /// Connector name that failed.
        connector: String,
        /// Human-readable error message.
        msg: String,
    },

    /// The persisted series violates its ordering or format invariants.
    #[error("store corrupted for {key}: {reason}")]
    StoreCorrupted {
        /// Display form of the affected series key.
        key: String,
        /// What the verification found.
        reason: String,
    },

    /// Local I/O failure outside of the corruption checks.
    #[error("io error: {0}")]
    Io(String),

    /// Some fetch windows of a series exhausted their retries.
    #[error("{failed} of {planned} windows failed; last error: {last_error}")]
    WindowsFailed {
        /// Number of windows planned for the gap.
        planned: usize,
        /// Number of windows that ended in `Failed`.
        failed: usize,
        /// Message of the last recorded failure.
        last_error: String,
    },

    /// The run was interrupted by a shutdown request.
    #[error("shutdown requested")]
    Shutdown,
}

impl SerieError {
    /// Helper: build an `UnknownInterval` error.
    pub fn unknown_interval(name: impl Into<String>) -> Self {
        Self::UnknownInterval { name: name.into() }
    }

    /// Helper: build an `UnknownExchange` error.
    pub fn unknown_exchange(name: impl Into<String>) -> Self {
        Self::UnknownExchange { name: name.into() }
    }

    /// Helper: build an `Unsupported` error.
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported { what: what.into() }
    }

    /// Helper: build a `Connector` error with the connector name and message.
    pub fn connector(connector: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Connector {
            connector: connector.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Helper: build a `Transient` error.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Helper: build a `RateLimited` error.
    pub fn rate_limited(connector: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        Self::RateLimited {
            connector: connector.into(),
            retry_after_ms,
        }
    }

    /// Helper: build a `StoreCorrupted` error.
    pub fn corrupted(key: impl ToString, reason: impl Into<String>) -> Self {
        Self::StoreCorrupted {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true if repeating the same call may succeed.
    ///
    /// Opaque `Connector` failures are treated as transient.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Transient(_)
                | Self::Timeout { .. }
                | Self::Connector { .. }
        )
    }

    /// Returns true if the error should abort the whole series without retry.
    #[must_use]
    pub const fn is_fatal_for_series(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Auth(_)
                | Self::StoreCorrupted { .. }
                | Self::Unsupported { .. }
                | Self::Io(_)
        )
    }

    /// Returns true for configuration errors that abort a run before any I/O.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::UnknownInterval { .. } | Self::UnknownExchange { .. } | Self::InvalidArg(_)
        )
    }

    /// Retry hint carried by a `RateLimited` error, if any.
    #[must_use]
    pub const fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }
}
