use std::collections::{BTreeMap, btree_map::Entry};

use crate::Candle;

/// Merge fetched pages into one ascending series (first page has priority).
///
/// - Candles are keyed by `ts`; the first appearance wins for duplicates, so
///   pages should be passed in window order.
/// - Candles are returned sorted by timestamp.
#[must_use]
pub fn merge_pages<I>(pages: I) -> Vec<Candle>
where
    I: IntoIterator<Item = Vec<Candle>>,
{
    let mut map: BTreeMap<i64, Candle> = BTreeMap::new();
    for page in pages {
        for c in page {
            if let Entry::Vacant(v) = map.entry(c.ts) {
                v.insert(c);
            }
        }
    }
    map.into_values().collect()
}

/// Same as [`merge_pages`] but keeps only candles with `from <= ts < to`.
///
/// Exchanges may pad a page with bars outside the requested range; those are
/// dropped here rather than stored.
#[must_use]
pub fn merge_pages_within<I>(pages: I, from: i64, to: i64) -> Vec<Candle>
where
    I: IntoIterator<Item = Vec<Candle>>,
{
    let mut merged = merge_pages(pages);
    merged.retain(|c| c.ts >= from && c.ts < to);
    merged
}

/// Prepare a batch for appending after `last`.
///
/// Drops every candle at or before `last`, then sorts and removes duplicate
/// timestamps (first wins). Re-appending already stored candles yields an
/// empty batch.
#[must_use]
pub fn retain_newer(candles: Vec<Candle>, last: Option<i64>) -> Vec<Candle> {
    let fresh = candles
        .into_iter()
        .filter(|c| last.is_none_or(|l| c.ts > l));
    merge_pages(std::iter::once(fresh.collect()))
}

/// Index of the first candle whose timestamp is not strictly greater than its
/// predecessor's, if any.
#[must_use]
pub fn first_disorder(candles: &[Candle]) -> Option<usize> {
    candles
        .windows(2)
        .position(|w| w[1].ts <= w[0].ts)
        .map(|i| i + 1)
}

/// True if timestamps are strictly increasing (no duplicates, ascending).
#[must_use]
pub fn is_strictly_increasing(candles: &[Candle]) -> bool {
    first_disorder(candles).is_none()
}

/// Count re-fetched candles whose values differ from the stored row with the
/// same timestamp.
///
/// Both inputs must be sorted ascending. Timestamps present on only one side
/// are ignored.
#[must_use]
pub fn count_revisions(stored: &[Candle], fetched: &[Candle]) -> usize {
    let mut revised = 0;
    let mut j = 0;
    for s in stored {
        while j < fetched.len() && fetched[j].ts < s.ts {
            j += 1;
        }
        if fetched.get(j).is_some_and(|f| f.ts == s.ts && f != s) {
            revised += 1;
        }
    }
    revised
}
