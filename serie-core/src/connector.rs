use async_trait::async_trait;

use crate::{Candle, Exchange, Interval, SerieError};

/// Remote candle source for one exchange.
///
/// Implementations wrap an exchange's REST history endpoint. The engine creates
/// one instance per exchange and shares it (behind an `Arc`) between every
/// series of that exchange, so implementations must be safe to call
/// concurrently.
///
/// Error contract:
/// - `RateLimited`, `Transient`, `Timeout` and `Connector` are retried.
/// - `NotFound` and `Auth` abort the affected series.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Exchange identifier, e.g. `"binance"`. Also the store directory name.
    fn name(&self) -> &'static str;

    /// Maximum number of candles returned per call.
    ///
    /// Defaults to the exchange catalog value for [`name`](Self::name).
    fn page_limit(&self) -> usize {
        Exchange::page_limit_for(self.name())
    }

    /// Intervals this source can serve natively.
    fn supported_intervals(&self) -> &'static [Interval] {
        Interval::ALL
    }

    /// Convenience: check a single interval against [`supported_intervals`](Self::supported_intervals).
    fn supports_interval(&self, interval: Interval) -> bool {
        self.supported_intervals().contains(&interval)
    }

    /// Fetch up to `limit` candles of `symbol` whose open time is `>= since` (ms).
    ///
    /// Pages may be returned in any order and may overlap neighbouring pages;
    /// the caller sorts and deduplicates.
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        since: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, SerieError>;
}
