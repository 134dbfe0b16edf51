//! serie-mock
//!
//! Candle sources for CI-safe tests and examples:
//! - [`MockExchange`]: deterministic synthetic candles for a fixed set of listings.
//! - [`DynamicMockSource`]: a [`MockExchange`] whose behavior tests script per
//!   symbol or per window through a [`DynamicMockController`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serie_core::{Candle, CandleSource, Exchange, Interval, SerieError};

mod dynamic;

pub use dynamic::{DynamicMockController, DynamicMockSource, FetchCall, MockBehavior};

/// Deterministic candle for `symbol` at open time `ts`.
///
/// Prices depend only on the symbol and the bar index, so two fetches of the
/// same bar always agree.
#[must_use]
pub fn synthetic_candle(symbol: &str, interval: Interval, ts: i64) -> Candle {
    let seed: i64 = symbol.bytes().map(i64::from).sum::<i64>() % 97;
    let bar = ts.div_euclid(interval.millis());
    let base = 10_000 + seed * 100 + bar.rem_euclid(50) * 7;
    let swing = 25 + bar.rem_euclid(13);
    let open = Decimal::new(base, 2);
    let close = Decimal::new(base + bar.rem_euclid(5) - 2, 2);
    Candle::new(
        ts,
        open,
        Decimal::new(base + swing, 2),
        Decimal::new(base - swing, 2),
        close,
        Decimal::new(1_000 + bar.rem_euclid(100) * 3, 1),
    )
}

/// Synthetic exchange: every listed symbol has one candle per interval from
/// its listing time up to (excluding) the exchange's `latest` bound. Monthly
/// candles open on calendar month starts.
///
/// Clones share the call counter and the `latest` bound, so a test can keep a
/// clone as a handle after registering the source.
#[derive(Debug, Clone)]
pub struct MockExchange {
    name: &'static str,
    page_limit: usize,
    intervals: &'static [Interval],
    listings: HashMap<String, i64>,
    latest: Arc<AtomicI64>,
    calls: Arc<AtomicUsize>,
}

impl MockExchange {
    /// A mock named after an exchange, with that exchange's catalog page limit.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            page_limit: Exchange::page_limit_for(name),
            intervals: Interval::ALL,
            listings: HashMap::new(),
            latest: Arc::new(AtomicI64::new(i64::MAX)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// List `symbol` with data starting at `listed_at` (ms).
    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>, listed_at: i64) -> Self {
        self.listings.insert(symbol.into(), listed_at);
        self
    }

    /// Override the maximum candles per call.
    #[must_use]
    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit;
        self
    }

    /// Restrict the intervals served.
    #[must_use]
    pub fn with_intervals(mut self, intervals: &'static [Interval]) -> Self {
        self.intervals = intervals;
        self
    }

    /// No candle opens at or after `latest` (ms).
    #[must_use]
    pub fn with_latest(self, latest: i64) -> Self {
        self.set_latest(latest);
        self
    }

    /// Move the `latest` bound, e.g. to simulate time passing between runs.
    pub fn set_latest(&self, latest: i64) {
        self.latest.store(latest, Ordering::SeqCst);
    }

    /// Number of `fetch_candles` calls served so far (including errors).
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Candles this exchange would return for one call.
    ///
    /// # Errors
    /// Returns `NotFound` for symbols that are not listed.
    pub fn generate(
        &self,
        symbol: &str,
        interval: Interval,
        since: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, SerieError> {
        let listed_at = *self
            .listings
            .get(symbol)
            .ok_or_else(|| SerieError::not_found(format!("symbol {symbol} on {}", self.name)))?;
        let mut ts = interval.next_open(since.max(listed_at));
        let latest = self.latest.load(Ordering::SeqCst);
        let take = limit.min(self.page_limit);
        let mut out = Vec::with_capacity(take.min(4096));
        while out.len() < take && ts < latest {
            out.push(synthetic_candle(symbol, interval, ts));
            ts = interval.advance(ts, 1);
        }
        Ok(out)
    }
}

#[async_trait]
impl CandleSource for MockExchange {
    fn name(&self) -> &'static str {
        self.name
    }

    fn page_limit(&self) -> usize {
        self.page_limit
    }

    fn supported_intervals(&self) -> &'static [Interval] {
        self.intervals
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        since: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, SerieError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.generate(symbol, interval, since, limit)
    }
}
