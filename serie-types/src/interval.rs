//! Interval catalog: the fixed set of candle cadences the engine understands.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::SerieError;

/// Supported candle interval.
///
/// The catalog is closed; names outside of it are rejected with
/// [`SerieError::UnknownInterval`] when parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interval {
    /// One minute (`1m`).
    I1m,
    /// Two minutes (`2m`).
    I2m,
    /// Five minutes (`5m`).
    I5m,
    /// Fifteen minutes (`15m`).
    I15m,
    /// Thirty minutes (`30m`).
    I30m,
    /// One hour (`1h`).
    I1h,
    /// Two hours (`2h`).
    I2h,
    /// Four hours (`4h`).
    I4h,
    /// Twelve hours (`12h`).
    I12h,
    /// One day (`1d`).
    D1,
    /// One week (`1w`).
    W1,
    /// One month (`1M`). [`millis`](Self::millis) is the mean Gregorian
    /// month; bars open on the first day of each calendar month (UTC).
    Mo1,
}

impl Interval {
    /// Every interval of the catalog, finest first.
    pub const ALL: &'static [Self] = &[
        Self::I1m,
        Self::I2m,
        Self::I5m,
        Self::I15m,
        Self::I30m,
        Self::I1h,
        Self::I2h,
        Self::I4h,
        Self::I12h,
        Self::D1,
        Self::W1,
        Self::Mo1,
    ];

    /// Canonical exchange-style name, e.g. `"1h"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::I1m => "1m",
            Self::I2m => "2m",
            Self::I5m => "5m",
            Self::I15m => "15m",
            Self::I30m => "30m",
            Self::I1h => "1h",
            Self::I2h => "2h",
            Self::I4h => "4h",
            Self::I12h => "12h",
            Self::D1 => "1d",
            Self::W1 => "1w",
            Self::Mo1 => "1M",
        }
    }

    /// Interval length in milliseconds.
    #[must_use]
    pub const fn millis(self) -> i64 {
        match self {
            Self::I1m => 60_000,
            Self::I2m => 120_000,
            Self::I5m => 300_000,
            Self::I15m => 900_000,
            Self::I30m => 1_800_000,
            Self::I1h => 3_600_000,
            Self::I2h => 7_200_000,
            Self::I4h => 14_400_000,
            Self::I12h => 43_200_000,
            Self::D1 => 86_400_000,
            Self::W1 => 604_800_000,
            Self::Mo1 => 2_629_746_000,
        }
    }

    /// Interval length as a `chrono` time span.
    #[must_use]
    pub fn duration(self) -> TimeDelta {
        TimeDelta::milliseconds(self.millis())
    }

    /// Parse an interval name.
    ///
    /// # Errors
    /// Returns [`SerieError::UnknownInterval`] if `name` is not in the catalog.
    pub fn parse(name: &str) -> Result<Self, SerieError> {
        name.parse()
    }

    /// Open time of the first bar at or after `ts`.
    ///
    /// Fixed intervals are aligned to the Unix epoch, `Mo1` to calendar months.
    #[must_use]
    pub fn next_open(self, ts: i64) -> i64 {
        if self == Self::Mo1 {
            return month_start(ts).map_or(ts, |start| {
                if start.timestamp_millis() == ts {
                    ts
                } else {
                    start
                        .checked_add_months(Months::new(1))
                        .map_or(i64::MAX, |next| next.timestamp_millis())
                }
            });
        }
        let step = self.millis();
        let base = ts.div_euclid(step) * step;
        if base < ts { base.saturating_add(step) } else { base }
    }

    /// Open time `n` bars after the bar opening at `ts`.
    #[must_use]
    pub fn advance(self, ts: i64, n: u32) -> i64 {
        if self == Self::Mo1 {
            return DateTime::<Utc>::from_timestamp_millis(ts)
                .and_then(|d| d.checked_add_months(Months::new(n)))
                .map_or(i64::MAX, |d| d.timestamp_millis());
        }
        ts.saturating_add(self.millis().saturating_mul(i64::from(n)))
    }

    /// Bars a fetch starting at `from` needs to reach `to` (exclusive).
    ///
    /// For fixed intervals this is `ceil((to - from) / millis)`. For `Mo1` it
    /// counts the calendar months opening in `[from, to)`.
    #[must_use]
    pub fn bars_between(self, from: i64, to: i64) -> i64 {
        if from >= to {
            return 0;
        }
        if self == Self::Mo1 {
            let first = self.next_open(from);
            if first >= to {
                return 0;
            }
            return match (month_index(first), month_index(to - 1)) {
                (Some(a), Some(b)) => b - a + 1,
                _ => 0,
            };
        }
        let step = self.millis();
        (to - from).saturating_add(step - 1) / step
    }
}

impl FromStr for Interval {
    type Err = SerieError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Case matters: "1m" is a minute, "1M" a month.
        Self::ALL
            .iter()
            .copied()
            .find(|iv| iv.as_str() == s)
            .ok_or_else(|| SerieError::unknown_interval(s))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Midnight (UTC) of the first day of the month containing `ts`.
fn month_start(ts: i64) -> Option<DateTime<Utc>> {
    let d = DateTime::<Utc>::from_timestamp_millis(ts)?;
    Some(
        NaiveDate::from_ymd_opt(d.year(), d.month(), 1)?
            .and_hms_opt(0, 0, 0)?
            .and_utc(),
    )
}

fn month_index(ts: i64) -> Option<i64> {
    let d = DateTime::<Utc>::from_timestamp_millis(ts)?;
    Some(i64::from(d.year()) * 12 + i64::from(d.month0()))
}

/// Look up the duration of an interval by name.
///
/// # Errors
/// Returns [`SerieError::UnknownInterval`] for names outside the catalog.
pub fn duration(name: &str) -> Result<TimeDelta, SerieError> {
    Interval::parse(name).map(Interval::duration)
}

/// Look up the millisecond granularity of an interval by name.
///
/// # Errors
/// Returns [`SerieError::UnknownInterval`] for names outside the catalog.
pub fn milliseconds(name: &str) -> Result<i64, SerieError> {
    Interval::parse(name).map(Interval::millis)
}
