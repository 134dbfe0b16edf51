use std::time::Duration;

use rand::Rng;
use serie_core::{BackoffConfig, SerieError, SeriesKey, SyncResult, WindowFailure};

/// Add up to `jitter_percent` of `base_ms` as random jitter.
pub fn jitter_wait(base_ms: u64, jitter_percent: u32) -> u64 {
    let jitter_range = if jitter_percent == 0 {
        1
    } else {
        std::cmp::max(1, (base_ms.saturating_mul(u64::from(jitter_percent))) / 100)
    };
    let mut rng = rand::rng();
    base_ms + rng.random_range(0..jitter_range)
}

/// Delay before the retry that follows the `failures`-th failed attempt of a window.
///
/// Grows by `factor` per failure from `min_backoff_ms`, capped at `max_backoff_ms`,
/// then jittered.
#[must_use]
pub fn backoff_delay(cfg: &BackoffConfig, failures: u32) -> Duration {
    let factor = u64::from(cfg.factor.max(1));
    let mut base = cfg.min_backoff_ms;
    for _ in 1..failures {
        base = base.saturating_mul(factor);
        if base >= cfg.max_backoff_ms {
            break;
        }
    }
    let base = base.min(cfg.max_backoff_ms);
    let jittered = jitter_wait(base, u32::from(cfg.jitter_percent.min(100)));
    Duration::from_millis(jittered.min(cfg.max_backoff_ms))
}

/// Keys whose result asks for another run (`PartialFailure`, `Failed`, `Skipped`).
#[must_use]
pub fn failed_keys(results: &[SyncResult]) -> Vec<SeriesKey> {
    results
        .iter()
        .filter(|r| r.status.needs_retry())
        .map(|r| r.key.clone())
        .collect()
}

/// Collapse the failed windows of one key into a single summary error.
pub fn summarize_failures(planned: usize, failures: &[WindowFailure]) -> SerieError {
    SerieError::WindowsFailed {
        planned,
        failed: failures.len(),
        last_error: failures
            .last()
            .map_or_else(String::new, |f| f.error.to_string()),
    }
}

/// Run `fut` under an optional deadline.
///
/// On expiry returns `SerieError::Timeout` labelled `"sync"`.
///
/// # Errors
/// Returns `Timeout` if the deadline elapses first.
pub async fn with_request_deadline<F, T>(deadline: Option<Duration>, fut: F) -> Result<T, SerieError>
where
    F: core::future::Future<Output = T>,
{
    match deadline {
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| deadline_error(d)),
        None => Ok(fut.await),
    }
}

pub(crate) fn deadline_error(d: Duration) -> SerieError {
    SerieError::Timeout {
        connector: "sync".to_string(),
        timeout_ms: u64::try_from(d.as_millis()).unwrap_or(u64::MAX),
    }
}
