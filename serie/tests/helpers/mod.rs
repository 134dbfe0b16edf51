// Shared fixtures for the sync tests; each test binary uses a subset.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serie::{Candle, Interval, MemoryStore, Serie, SerieBuilder, SeriesKey, SeriesStore};
use serie_mock::{DynamicMockController, DynamicMockSource, MockExchange, synthetic_candle};

pub const H: i64 = 3_600_000;
pub const BINANCE: &str = "binance";
pub const BTC: &str = "BTC/USDT";
pub const ETH: &str = "ETH/USDT";

/// Construct a UTC `DateTime` from components for readability in tests.
pub fn dt(y: i32, m: u32, d: u32, hh: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, hh, 0, 0)
        .single()
        .expect("valid datetime")
}

/// `DateTime` for a millisecond timestamp.
pub fn at(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).expect("representable timestamp")
}

pub fn key(symbol: &str, interval: Interval) -> SeriesKey {
    SeriesKey::new(BINANCE, symbol, interval)
}

/// Binance mock listing BTC and ETH since the epoch.
pub fn exchange() -> MockExchange {
    MockExchange::new(BINANCE)
        .with_symbol(BTC, 0)
        .with_symbol(ETH, 0)
}

/// Hourly synthetic candles `[from, to)`, as the mock would serve them.
pub fn hourly(symbol: &str, from: i64, to: i64) -> Vec<Candle> {
    (from / H..to / H)
        .map(|i| synthetic_candle(symbol, Interval::I1h, i * H))
        .collect()
}

/// Timestamps of every stored candle of `key`.
pub fn stored_ts(store: &MemoryStore, key: &SeriesKey) -> Vec<i64> {
    store.snapshot(key).iter().map(|c| c.ts).collect()
}

pub struct Harness {
    pub serie: Serie,
    pub store: Arc<MemoryStore>,
    pub controller: DynamicMockController,
}

impl Harness {
    /// Seed `key` with candles before a run.
    pub fn seed(&self, key: &SeriesKey, candles: Vec<Candle>) {
        self.store.append(key, candles).expect("seed store");
    }
}

/// Serie over a scriptable mock and a memory store, without retry backoff.
pub fn harness(mock: MockExchange, configure: impl FnOnce(SerieBuilder) -> SerieBuilder) -> Harness {
    let (source, controller) = DynamicMockSource::new_with_controller(mock);
    let store = Arc::new(MemoryStore::new());
    let builder = Serie::builder()
        .with_source(source)
        .store(Arc::clone(&store) as Arc<dyn SeriesStore>)
        .backoff(None)
        .provider_timeout(Duration::from_secs(1));
    let serie = configure(builder).build().expect("valid serie");
    Harness {
        serie,
        store,
        controller,
    }
}
