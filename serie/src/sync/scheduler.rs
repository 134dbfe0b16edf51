//! Window planning and bounded, retried execution of one series gap.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serie_core::{
    Candle, CandleSource, FetchWindow, Interval, SerieError, SyncConfig, WindowFailure,
    merge_pages_within,
};
use tokio::sync::{Semaphore, watch};
use tokio::time::Instant;

use super::util::{backoff_delay, deadline_error, with_request_deadline};
use super::window::{WindowState, WindowTask};

/// Partition `[from, to)` into windows of at most `page` candles.
///
/// Window `k` starts at `from + k * page * interval`. The last window is
/// clipped to the fewest candles that still reach `to`, so a gap of `N`
/// interval units yields exactly `ceil(N / page)` windows. Monthly windows
/// step by calendar months from the first month opening at or after `from`.
///
/// ```
/// use serie::{Interval, plan_windows};
///
/// let h = Interval::I1h.millis();
/// let windows = plan_windows(0, 50 * h, 24, Interval::I1h);
/// let limits: Vec<usize> = windows.iter().map(|w| w.limit).collect();
/// assert_eq!(limits, vec![24, 24, 2]);
/// assert_eq!(windows[2].since, 48 * h);
/// ```
#[must_use]
pub fn plan_windows(from: i64, to: i64, page: usize, interval: Interval) -> Vec<FetchWindow> {
    if from >= to || page == 0 {
        return Vec::new();
    }
    let page_bars = u32::try_from(page).unwrap_or(u32::MAX);
    let mut windows = Vec::new();
    let mut since = from;
    while since < to {
        let units = interval.bars_between(since, to);
        if units == 0 {
            break;
        }
        let limit = usize::try_from(units).map_or(page, |u| u.min(page));
        windows.push(FetchWindow::new(since, limit));
        let anchor = if interval == Interval::Mo1 {
            interval.next_open(since)
        } else {
            since
        };
        since = interval.advance(anchor, page_bars);
    }
    windows
}

/// Result of fetching one gap.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Candles from every successful window, within `[from, to)`, sorted and
    /// deduplicated (earlier windows win).
    pub candles: Vec<Candle>,
    /// Windows that ended `Failed`, in window order.
    pub failed: Vec<WindowFailure>,
    /// First fatal error seen for the series, if any.
    pub fatal: Option<SerieError>,
    /// Windows never attempted.
    pub cancelled: usize,
    /// Windows planned for the gap.
    pub planned: usize,
}

/// Why work should stop: shutdown request or run deadline.
pub(crate) struct StopSignal {
    shutdown: watch::Receiver<bool>,
    deadline: Option<(Instant, Duration)>,
}

impl StopSignal {
    pub(crate) fn new(shutdown: watch::Receiver<bool>, timeout: Option<Duration>) -> Self {
        Self {
            shutdown,
            deadline: timeout.map(|t| (Instant::now() + t, t)),
        }
    }

    /// The error interrupted work is reported with, once stopping.
    pub(crate) fn reason(&self) -> Option<SerieError> {
        if *self.shutdown.borrow() {
            return Some(SerieError::Shutdown);
        }
        match self.deadline {
            Some((at, timeout)) if Instant::now() >= at => Some(deadline_error(timeout)),
            _ => None,
        }
    }

    /// Time left before the run deadline.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|(at, _)| at.saturating_duration_since(Instant::now()))
    }
}

/// Everything needed to fetch windows of one series.
pub(crate) struct WindowFetcher<'a> {
    pub(crate) source: &'a Arc<dyn CandleSource>,
    pub(crate) permits: &'a Semaphore,
    pub(crate) symbol: &'a str,
    pub(crate) interval: Interval,
    pub(crate) cfg: &'a SyncConfig,
    pub(crate) stop: &'a StopSignal,
}

impl WindowFetcher<'_> {
    /// Fetch `[from, to)` in windows of `page` candles.
    pub(crate) async fn fetch_range(&self, from: i64, to: i64, page: usize) -> FetchOutcome {
        let windows = plan_windows(from, to, page, self.interval);
        let planned = windows.len();
        #[cfg(feature = "tracing")]
        tracing::info!(
            target: "serie::sync",
            symbol = self.symbol,
            interval = %self.interval,
            from,
            to,
            windows = planned,
            "fetching gap"
        );

        let fatal = OnceLock::new();
        let fatal_ref = &fatal;
        let mut done: Vec<(usize, WindowTask, Vec<Candle>)> =
            stream::iter(windows.into_iter().enumerate())
                .map(|(idx, window)| async move {
                    let (task, page) = self.run_window(window, fatal_ref).await;
                    (idx, task, page)
                })
                .buffer_unordered(self.cfg.window_concurrency.max(1))
                .collect()
                .await;
        done.sort_by_key(|(idx, ..)| *idx);

        let mut pages = Vec::with_capacity(done.len());
        let mut failed = Vec::new();
        let mut cancelled = 0;
        for (_, task, page) in done {
            match task.state {
                WindowState::Succeeded => pages.push(page),
                WindowState::Cancelled => cancelled += 1,
                _ => failed.extend(task.into_failure()),
            }
        }

        FetchOutcome {
            candles: merge_pages_within(pages, from, to),
            failed,
            fatal: fatal.into_inner(),
            cancelled,
            planned,
        }
    }

    /// Drive one window to a terminal state.
    ///
    /// The window is cancelled if stopping (or a sibling failed fatally) by the
    /// time its first permit is granted. Once started it keeps retrying.
    async fn run_window(
        &self,
        window: FetchWindow,
        fatal: &OnceLock<SerieError>,
    ) -> (WindowTask, Vec<Candle>) {
        let mut task = WindowTask::new(window);
        let first = with_request_deadline(self.stop.remaining(), self.permits.acquire()).await;
        let mut permit = match first {
            Ok(Ok(permit)) if self.stop.reason().is_none() && fatal.get().is_none() => Some(permit),
            _ => {
                task.cancel();
                return (task, Vec::new());
            }
        };

        loop {
            let acquired = match permit.take() {
                Some(p) => Ok(p),
                None => self
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| SerieError::Io("exchange permits closed".to_string())),
            };
            task.begin_attempt();
            let res = match acquired {
                Ok(_permit) => {
                    self.source
                        .fetch_candles(self.symbol, self.interval, window.since, window.limit)
                        .await
                }
                Err(e) => Err(e),
            };

            let err = match res {
                Ok(page) => {
                    task.succeed();
                    return (task, page);
                }
                Err(err) => err,
            };

            let hint = err.retry_after_ms();
            let fatal_err = err.is_fatal_for_series().then(|| err.clone());
            if task.fail_attempt(err, self.cfg.retry.max_attempts) == WindowState::Retrying {
                let delay = hint.map_or_else(
                    || {
                        self.cfg
                            .retry
                            .backoff
                            .as_ref()
                            .map_or(Duration::ZERO, |b| backoff_delay(b, task.attempts))
                    },
                    Duration::from_millis,
                );
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    target: "serie::sync",
                    symbol = self.symbol,
                    since = window.since,
                    attempt = task.attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = ?task.last_error,
                    "retrying window"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                continue;
            }

            #[cfg(feature = "tracing")]
            tracing::warn!(
                target: "serie::sync",
                symbol = self.symbol,
                since = window.since,
                attempts = task.attempts,
                error = ?task.last_error,
                "window failed"
            );
            if let Some(e) = fatal_err {
                let _ = fatal.set(e);
            }
            return (task, Vec::new());
        }
    }
}
