use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serie_core::{Candle, SerieError, SeriesKey, SeriesStore, SeriesSummary, retain_newer};

/// In-memory series store with the same contract as [`CsvStore`](crate::CsvStore).
///
/// Useful for tests and demos; contents are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    series: RwLock<HashMap<SeriesKey, BTreeMap<i64, Candle>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored candle of `key`, including the most recent one.
    #[must_use]
    pub fn snapshot(&self, key: &SeriesKey) -> Vec<Candle> {
        let series = self.series.read().expect("lock poisoned");
        series
            .get(key)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of stored candles for `key`.
    #[must_use]
    pub fn len(&self, key: &SeriesKey) -> usize {
        let series = self.series.read().expect("lock poisoned");
        series.get(key).map_or(0, BTreeMap::len)
    }
}

impl SeriesStore for MemoryStore {
    fn last_timestamp(&self, key: &SeriesKey) -> Result<Option<i64>, SerieError> {
        let series = self.series.read().expect("lock poisoned");
        Ok(series
            .get(key)
            .and_then(|m| m.last_key_value())
            .map(|(ts, _)| *ts))
    }

    fn load(&self, key: &SeriesKey, from_ts: i64, to_ts: i64) -> Result<Vec<Candle>, SerieError> {
        if from_ts >= to_ts {
            return Ok(Vec::new());
        }
        let series = self.series.read().expect("lock poisoned");
        let Some(m) = series.get(key) else {
            return Ok(Vec::new());
        };
        let newest = m.last_key_value().map(|(ts, _)| *ts);
        Ok(m.range(from_ts..to_ts)
            .filter(|(ts, _)| Some(**ts) != newest)
            .map(|(_, c)| c.clone())
            .collect())
    }

    fn append(&self, key: &SeriesKey, candles: Vec<Candle>) -> Result<usize, SerieError> {
        let mut series = self.series.write().expect("lock poisoned");
        let m = series.entry(key.clone()).or_default();
        let last = m.last_key_value().map(|(ts, _)| *ts);
        let batch = retain_newer(candles, last);
        let n = batch.len();
        m.extend(batch.into_iter().map(|c| (c.ts, c)));
        Ok(n)
    }

    fn tail(&self, key: &SeriesKey, n: usize) -> Result<Vec<Candle>, SerieError> {
        let series = self.series.read().expect("lock poisoned");
        let Some(m) = series.get(key) else {
            return Ok(Vec::new());
        };
        let mut out: Vec<Candle> = m.values().rev().take(n).cloned().collect();
        out.reverse();
        Ok(out)
    }

    fn inventory(&self) -> Result<Vec<SeriesSummary>, SerieError> {
        let series = self.series.read().expect("lock poisoned");
        let mut out: Vec<SeriesSummary> = series
            .iter()
            .filter(|(_, m)| !m.is_empty())
            .map(|(key, m)| SeriesSummary {
                key: key.clone(),
                rows: m.len(),
                first_ts: m.first_key_value().map(|(ts, _)| *ts),
                last_ts: m.last_key_value().map(|(ts, _)| *ts),
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    fn rebuild(&self, key: &SeriesKey) -> Result<usize, SerieError> {
        // A map keyed by timestamp is always ordered and unique.
        Ok(self.len(key))
    }
}
