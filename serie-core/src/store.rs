use crate::{Candle, SerieError, SeriesKey, SeriesSummary};

/// Append-only persistence for candle series, one record set per [`SeriesKey`].
///
/// Contract shared by every implementation:
/// - Stored timestamps are strictly increasing; rows are never rewritten
///   except by [`rebuild`](Self::rebuild).
/// - [`append`](Self::append) is all-or-nothing with respect to readers of the
///   same store instance.
/// - The most recent stored candle may be an open bar; [`load`](Self::load)
///   never returns it.
///
/// Methods are synchronous; the orchestrator calls them from the task that owns
/// the series, so a single key is never written concurrently.
pub trait SeriesStore: Send + Sync {
    /// Open time of the most recent stored candle, or `None` for an empty series.
    ///
    /// # Errors
    /// Returns `StoreCorrupted` if the stored tail cannot be parsed.
    fn last_timestamp(&self, key: &SeriesKey) -> Result<Option<i64>, SerieError>;

    /// Candles with `from_ts <= ts < to_ts`, ascending, excluding the most recent stored one.
    ///
    /// # Errors
    /// Returns `StoreCorrupted` if the series violates the ordering invariant.
    fn load(&self, key: &SeriesKey, from_ts: i64, to_ts: i64) -> Result<Vec<Candle>, SerieError>;

    /// Append new candles, dropping any at or before the last stored timestamp.
    ///
    /// Input may be unordered and may contain duplicates. Returns the number of
    /// candles actually appended.
    ///
    /// # Errors
    /// Returns `StoreCorrupted` if read-back verification fails, `Io` for
    /// other write failures.
    fn append(&self, key: &SeriesKey, candles: Vec<Candle>) -> Result<usize, SerieError>;

    /// The last `n` stored candles, ascending, including the most recent one.
    ///
    /// # Errors
    /// Returns `StoreCorrupted` if the stored tail cannot be parsed.
    fn tail(&self, key: &SeriesKey, n: usize) -> Result<Vec<Candle>, SerieError>;

    /// Every stored series with its row count and time bounds.
    ///
    /// # Errors
    /// Returns `Io` if the store cannot be enumerated.
    fn inventory(&self) -> Result<Vec<SeriesSummary>, SerieError>;

    /// Rewrite a series from its parseable rows, sorted and deduplicated.
    ///
    /// Returns the number of rows kept.
    ///
    /// # Errors
    /// Returns `Io` if the replacement cannot be written.
    fn rebuild(&self, key: &SeriesKey) -> Result<usize, SerieError>;
}
