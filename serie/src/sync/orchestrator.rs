use std::collections::HashSet;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serie_core::{
    Candle, Interval, SerieError, SeriesKey, SyncResult, SyncStatus, count_revisions,
};

use super::builder::SyncBuilder;
use super::gap::{ResumeDecision, resume_point};
use super::scheduler::{FetchOutcome, StopSignal, WindowFetcher};
use super::util::summarize_failures;
use crate::core::{ExchangeHandle, Serie};

impl Serie {
    /// Start an ergonomic sync request for `exchange`.
    #[must_use]
    pub fn sync_builder<'a>(&'a self, exchange: &'a str) -> SyncBuilder<'a> {
        SyncBuilder::new(self, exchange)
    }

    /// Bring every (symbol, interval) series of `exchange` up to `end`.
    ///
    /// Series without records are backfilled from `start`. One result is
    /// returned per series, intervals-major (`intervals × symbols`). A failing
    /// series never aborts the others.
    ///
    /// # Errors
    /// Returns an error before any I/O if `exchange` is not registered, an
    /// interval name is unknown or unsupported by the source, `symbols` is
    /// empty or has duplicates, or `start >= end`.
    pub async fn sync<S, I>(
        &self,
        exchange: &str,
        symbols: &[S],
        intervals: &[I],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SyncResult>, SerieError>
    where
        S: AsRef<str>,
        I: AsRef<str>,
    {
        let intervals = intervals
            .iter()
            .map(|name| Interval::parse(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let symbols: Vec<String> = symbols.iter().map(|s| s.as_ref().to_string()).collect();
        self.sync_series(exchange, &symbols, &intervals, start, end)
            .await
    }

    pub(crate) async fn sync_series(
        &self,
        exchange: &str,
        symbols: &[String],
        intervals: &[Interval],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SyncResult>, SerieError> {
        let handle = self.exchange(exchange)?;
        validate_request(handle, symbols, intervals, start, end)?;

        let exchange = handle.source.name();
        let keys: Vec<SeriesKey> = intervals
            .iter()
            .flat_map(|iv| {
                symbols
                    .iter()
                    .map(move |s| SeriesKey::new(exchange, s.clone(), *iv))
            })
            .collect();
        #[cfg(feature = "tracing")]
        tracing::info!(
            target: "serie::sync",
            exchange,
            series = keys.len(),
            start = %start,
            end = %end,
            "sync started"
        );

        let stop = StopSignal::new(self.shutdown.subscribe(), self.cfg.request_timeout);
        let (start_ms, end_ms) = (start.timestamp_millis(), end.timestamp_millis());
        let results: Vec<SyncResult> = stream::iter(keys)
            .map(|key| self.sync_key(handle, key, start_ms, end_ms, &stop))
            .buffered(self.cfg.key_concurrency.max(1))
            .collect()
            .await;

        #[cfg(feature = "tracing")]
        tracing::info!(
            target: "serie::sync",
            exchange,
            ok = results.iter().filter(|r| r.is_ok()).count(),
            appended = results.iter().map(|r| r.candles_appended).sum::<usize>(),
            "sync finished"
        );
        Ok(results)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            target = "serie::sync",
            name = "serie::sync::key",
            skip_all,
            fields(key = %key),
        )
    )]
    async fn sync_key(
        &self,
        handle: &ExchangeHandle,
        key: SeriesKey,
        start: i64,
        end: i64,
        stop: &StopSignal,
    ) -> SyncResult {
        if let Some(reason) = stop.reason() {
            #[cfg(feature = "tracing")]
            tracing::info!(target: "serie::sync", error = %reason, "series skipped");
            return interrupted(key, 0, reason);
        }

        let decision = match self.resume_or_rebuild(&key, end, start) {
            Ok(d) => d,
            Err(e) => return self.series_failed(key, e),
        };
        let Some(from) = decision.start() else {
            #[cfg(feature = "tracing")]
            tracing::info!(target: "serie::sync", "series up to date");
            return SyncResult::no_gap(key);
        };

        // Stored bars covered by the heal overlap, to spot upstream revisions.
        let healed: Vec<Candle> = match decision {
            ResumeDecision::Resume { .. } => {
                let depth = usize::try_from(self.cfg.heal_bars).unwrap_or(usize::MAX);
                match self.store.tail(&key, depth.saturating_add(1)) {
                    Ok(rows) => rows.into_iter().filter(|c| c.ts >= from).collect(),
                    Err(e) => return self.series_failed(key, e),
                }
            }
            _ => Vec::new(),
        };

        let page = self
            .cfg
            .page_size
            .map_or(handle.source.page_limit(), |p| p.min(handle.source.page_limit()))
            .max(1);
        let fetcher = WindowFetcher {
            source: &handle.source,
            permits: &handle.permits,
            symbol: &key.symbol,
            interval: key.interval,
            cfg: &self.cfg,
            stop,
        };
        let outcome = fetcher.fetch_range(from, end, page).await;
        self.commit(key, outcome, &healed, stop)
    }

    /// Resume decision for `key`, rebuilding a corrupted series first when configured.
    fn resume_or_rebuild(
        &self,
        key: &SeriesKey,
        end: i64,
        start: i64,
    ) -> Result<ResumeDecision, SerieError> {
        let store = self.store.as_ref();
        match resume_point(store, key, end, start, self.cfg.heal_bars) {
            Err(SerieError::StoreCorrupted { reason, .. }) if self.cfg.rebuild_corrupted => {
                let kept = store.rebuild(key)?;
                #[cfg(feature = "tracing")]
                tracing::warn!(target: "serie::sync", kept, reason = %reason, "rebuilt corrupted series");
                #[cfg(not(feature = "tracing"))]
                let _ = (kept, reason);
                resume_point(store, key, end, start, self.cfg.heal_bars)
            }
            other => other,
        }
    }

    /// Turn a fetch outcome into a stored batch and a result.
    fn commit(
        &self,
        key: SeriesKey,
        outcome: FetchOutcome,
        healed: &[Candle],
        stop: &StopSignal,
    ) -> SyncResult {
        let FetchOutcome {
            candles,
            failed,
            fatal,
            cancelled,
            planned,
        } = outcome;

        if let Some(err) = fatal {
            let mut res = self.series_failed(key, err);
            res.windows_planned = planned;
            res.windows_failed = failed;
            return res;
        }
        if cancelled > 0 {
            let reason = stop.reason().unwrap_or(SerieError::Shutdown);
            #[cfg(feature = "tracing")]
            tracing::info!(target: "serie::sync", cancelled, planned, error = %reason, "series interrupted");
            let mut res = interrupted(key, planned, reason);
            res.windows_failed = failed;
            return res;
        }

        let revised = count_revisions(healed, &candles);
        #[cfg(feature = "tracing")]
        if revised > 0 {
            tracing::warn!(target: "serie::sync", revised, "upstream revised stored bars");
        }

        // Keep the series gap-free: nothing at or after the first hole is stored.
        let cutoff = failed.iter().map(|f| f.window.since).min();
        let batch: Vec<Candle> = match cutoff {
            Some(hole) => candles.into_iter().filter(|c| c.ts < hole).collect(),
            None => candles,
        };
        let appended = match self.store.append(&key, batch) {
            Ok(n) => n,
            Err(e) => {
                let mut res = self.series_failed(key, e);
                res.windows_planned = planned;
                res.windows_failed = failed;
                return res;
            }
        };

        let (status, error) = if failed.is_empty() {
            (SyncStatus::Success, None)
        } else {
            (
                SyncStatus::PartialFailure,
                Some(summarize_failures(planned, &failed)),
            )
        };
        #[cfg(feature = "tracing")]
        tracing::info!(
            target: "serie::sync",
            status = ?status,
            appended,
            windows = planned,
            failed = failed.len(),
            "series synced"
        );
        SyncResult {
            key,
            status,
            candles_appended: appended,
            windows_planned: planned,
            windows_failed: failed,
            revised,
            error,
        }
    }

    fn series_failed(&self, key: SeriesKey, err: SerieError) -> SyncResult {
        #[cfg(feature = "tracing")]
        if matches!(err, SerieError::StoreCorrupted { .. }) {
            tracing::error!(target: "serie::sync", error = %err, "series store corrupted");
        } else {
            tracing::warn!(target: "serie::sync", error = %err, "series failed");
        }
        SyncResult::failed(key, err)
    }
}

fn interrupted(key: SeriesKey, planned: usize, reason: SerieError) -> SyncResult {
    let mut res = SyncResult::skipped(key);
    res.windows_planned = planned;
    res.error = Some(reason);
    res
}

/// Reject malformed requests before any store or network access.
fn validate_request(
    handle: &ExchangeHandle,
    symbols: &[String],
    intervals: &[Interval],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), SerieError> {
    if symbols.is_empty() {
        return Err(SerieError::InvalidArg("no symbols specified".into()));
    }
    let mut seen = HashSet::new();
    for symbol in symbols {
        if symbol.trim().is_empty() {
            return Err(SerieError::InvalidArg("empty symbol".into()));
        }
        if !seen.insert(symbol.as_str()) {
            return Err(SerieError::InvalidArg(format!(
                "duplicate symbol '{symbol}' in symbols list"
            )));
        }
    }
    if intervals.is_empty() {
        return Err(SerieError::InvalidArg("no intervals specified".into()));
    }
    let mut seen = HashSet::new();
    for iv in intervals {
        if !seen.insert(*iv) {
            return Err(SerieError::InvalidArg(format!(
                "duplicate interval '{iv}' in intervals list"
            )));
        }
        if !handle.source.supports_interval(*iv) {
            return Err(SerieError::unsupported(format!(
                "interval {iv} on {}",
                handle.source.name()
            )));
        }
    }
    if start >= end {
        return Err(SerieError::InvalidArg(format!(
            "start {start} must be before end {end}"
        )));
    }
    Ok(())
}
