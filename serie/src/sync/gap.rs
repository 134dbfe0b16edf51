//! Resume-point detection for one series.

use serie_core::{SerieError, SeriesKey, SeriesStore};

/// Where a series must resume to reach a target end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    /// The last stored candle is within one interval of the target end.
    UpToDate,
    /// The series has no records; fetch everything from `from`.
    FullBackfill {
        /// Backfill start (ms).
        from: i64,
    },
    /// Re-fetch from `from`, which overlaps the last stored bars.
    Resume {
        /// Resume start (ms).
        from: i64,
    },
}

impl ResumeDecision {
    /// First timestamp to fetch, or `None` when already current.
    #[must_use]
    pub const fn start(self) -> Option<i64> {
        match self {
            Self::UpToDate => None,
            Self::FullBackfill { from } | Self::Resume { from } => Some(from),
        }
    }
}

/// Decide where `key` resumes so that it covers `[.., target_end)`.
///
/// `heal_bars` trailing stored bars are re-fetched on resume; the overlap is
/// dropped again on append, so stored rows never change.
///
/// # Errors
/// Propagates `StoreCorrupted` from the store's tail read.
pub fn resume_point(
    store: &dyn SeriesStore,
    key: &SeriesKey,
    target_end: i64,
    default_start: i64,
    heal_bars: u32,
) -> Result<ResumeDecision, SerieError> {
    let step = key.interval.millis();
    match store.last_timestamp(key)? {
        None if default_start >= target_end => Ok(ResumeDecision::UpToDate),
        None => Ok(ResumeDecision::FullBackfill {
            from: default_start,
        }),
        Some(last) if key.interval.advance(last, 1) >= target_end => Ok(ResumeDecision::UpToDate),
        Some(last) => {
            let overlap = step.saturating_mul(i64::from(heal_bars));
            Ok(ResumeDecision::Resume {
                from: last.saturating_sub(overlap).max(0),
            })
        }
    }
}
