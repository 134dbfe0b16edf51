use crate::{Candle, Interval};

/// Find holes in an ascending series.
///
/// Each hole is returned as `[start, end)`: `start` is the open time of the
/// bar expected after the one preceding the hole, `end` the open time of the
/// bar that follows it. Monthly bars are expected on calendar month starts.
///
/// ```
/// use serie_core::{Candle, Decimal, Interval, find_gaps};
///
/// let h = Interval::I1h.millis();
/// let mk = |ts: i64| Candle::new(ts, Decimal::ONE, Decimal::ONE, Decimal::ONE, Decimal::ONE, Decimal::ZERO);
/// let candles = vec![mk(0), mk(h), mk(4 * h)];
/// assert_eq!(find_gaps(&candles, Interval::I1h), vec![(2 * h, 4 * h)]);
/// ```
#[must_use]
pub fn find_gaps(candles: &[Candle], interval: Interval) -> Vec<(i64, i64)> {
    candles
        .windows(2)
        .filter_map(|w| {
            let expected = interval.advance(w[0].ts, 1);
            (w[1].ts > expected).then_some((expected, w[1].ts))
        })
        .collect()
}
