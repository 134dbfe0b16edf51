use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV sample for a fixed interval.
///
/// `ts` is the bar open time in milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, milliseconds since epoch.
    pub ts: i64,
    /// Opening price.
    pub open: Decimal,
    /// Highest traded price.
    pub high: Decimal,
    /// Lowest traded price.
    pub low: Decimal,
    /// Closing (or latest, for an open bar) price.
    pub close: Decimal,
    /// Traded base volume.
    pub volume: Decimal,
}

impl Candle {
    /// Construct a candle from its components.
    #[must_use]
    pub const fn new(
        ts: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Bar open time as a UTC datetime, if `ts` is representable.
    #[must_use]
    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.ts)
    }

    /// True if the price fields are mutually consistent and volume is non-negative.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && !self.volume.is_sign_negative()
    }
}
