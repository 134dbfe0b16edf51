use serde::{Deserialize, Serialize};

use crate::{FetchWindow, SerieError, SeriesKey};

/// Outcome class of one series in one orchestration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SyncStatus {
    /// The series was already current; nothing fetched.
    NoGap,
    /// Every planned window succeeded and the batch was committed.
    Success,
    /// Some windows failed; the contiguous prefix before the first failure was committed.
    PartialFailure,
    /// A fatal error for this series; nothing committed.
    Failed,
    /// Not processed because shutdown was requested.
    Skipped,
}

impl SyncStatus {
    /// True when a later run should retry this series.
    #[must_use]
    pub const fn needs_retry(self) -> bool {
        matches!(self, Self::PartialFailure | Self::Failed | Self::Skipped)
    }
}

/// A window that exhausted its retries or failed fatally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowFailure {
    /// The window as planned.
    pub window: FetchWindow,
    /// Attempts performed before giving up.
    pub attempts: u32,
    /// Error from the last attempt.
    pub error: SerieError,
}

/// Per-series outcome of a sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// The series this result describes.
    pub key: SeriesKey,
    /// Outcome class.
    pub status: SyncStatus,
    /// Candles appended to the store during this pass.
    pub candles_appended: usize,
    /// Windows planned for the gap (0 for `NoGap`/`Skipped`).
    pub windows_planned: usize,
    /// Windows that ended in `Failed`.
    pub windows_failed: Vec<WindowFailure>,
    /// Re-fetched stored bars whose upstream values differ from the stored row.
    pub revised: usize,
    /// Summary error for `PartialFailure`, `Failed` and interrupted series.
    pub error: Option<SerieError>,
}

impl SyncResult {
    /// Result for a series that was already current.
    #[must_use]
    pub const fn no_gap(key: SeriesKey) -> Self {
        Self::empty(key, SyncStatus::NoGap, None)
    }

    /// Result for a series that failed fatally.
    #[must_use]
    pub const fn failed(key: SeriesKey, error: SerieError) -> Self {
        Self::empty(key, SyncStatus::Failed, Some(error))
    }

    /// Result for a series that was not processed because of shutdown.
    #[must_use]
    pub const fn skipped(key: SeriesKey) -> Self {
        Self::empty(key, SyncStatus::Skipped, Some(SerieError::Shutdown))
    }

    const fn empty(key: SeriesKey, status: SyncStatus, error: Option<SerieError>) -> Self {
        Self {
            key,
            status,
            candles_appended: 0,
            windows_planned: 0,
            windows_failed: Vec::new(),
            revised: 0,
            error,
        }
    }

    /// True if the series completed without error.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status, SyncStatus::NoGap | SyncStatus::Success)
    }
}

/// Description of one stored series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSummary {
    /// The stored series.
    pub key: SeriesKey,
    /// Number of stored candles.
    pub rows: usize,
    /// First stored open time, if any.
    pub first_ts: Option<i64>,
    /// Last stored open time, if any.
    pub last_ts: Option<i64>,
}
