use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{Interval, SerieError};

/// Identifies one independently synchronized series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    /// Exchange identifier, e.g. `"binance"`.
    pub exchange: String,
    /// Market symbol as the exchange names it, e.g. `"BTC/USDT"`.
    pub symbol: String,
    /// Candle cadence.
    pub interval: Interval,
}

impl SeriesKey {
    /// Build a key from already validated parts.
    pub fn new(exchange: impl Into<String>, symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
            interval,
        }
    }

    /// Build a key from an interval name.
    ///
    /// # Errors
    /// Returns [`SerieError::UnknownInterval`] if `interval` is not catalogued.
    pub fn parse(
        exchange: impl Into<String>,
        symbol: impl Into<String>,
        interval: &str,
    ) -> Result<Self, SerieError> {
        Ok(Self::new(exchange, symbol, Interval::parse(interval)?))
    }

    /// Filesystem-safe form of the symbol (`BTC/USDT` becomes `BTC-USDT`).
    ///
    /// A literal `-` is written as `%2D` and `%` as `%25`, so the symbol can
    /// be recovered from the stem.
    #[must_use]
    pub fn file_stem(&self) -> String {
        let mut stem = String::with_capacity(self.symbol.len());
        for ch in self.symbol.chars() {
            match ch {
                '%' => stem.push_str("%25"),
                '-' => stem.push_str("%2D"),
                '/' => stem.push('-'),
                other => stem.push(other),
            }
        }
        stem
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.exchange, self.symbol, self.interval)
    }
}

/// One unit of scheduled work: a single paginated remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchWindow {
    /// First open time requested, in milliseconds.
    pub since: i64,
    /// Number of candles requested.
    pub limit: usize,
}

impl FetchWindow {
    /// Construct a window.
    #[must_use]
    pub const fn new(since: i64, limit: usize) -> Self {
        Self { since, limit }
    }

    /// Exclusive end of the time range covered by this window.
    #[must_use]
    pub fn end(&self, interval: Interval) -> i64 {
        let bars = u32::try_from(self.limit).unwrap_or(u32::MAX);
        let anchor = if interval == Interval::Mo1 {
            interval.next_open(self.since)
        } else {
            self.since
        };
        interval.advance(anchor, bars)
    }
}
