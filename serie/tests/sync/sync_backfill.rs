use crate::helpers::{BINANCE, BTC, ETH, H, at, dt, exchange, harness, key, stored_ts};
use serie::{Interval, SyncStatus};

#[tokio::test]
async fn one_day_of_hourly_candles_in_a_single_window() {
    let h = harness(exchange(), |b| b.page_size(24));
    let results = h
        .serie
        .sync(BINANCE, &[BTC], &["1h"], dt(2021, 1, 1, 0), dt(2021, 1, 2, 0))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let r = &results[0];
    assert_eq!(r.status, SyncStatus::Success);
    assert_eq!(r.windows_planned, 1);
    assert_eq!(r.candles_appended, 24);
    assert!(r.error.is_none());

    let first = dt(2021, 1, 1, 0).timestamp_millis();
    let ts = stored_ts(&h.store, &key(BTC, Interval::I1h));
    assert_eq!(ts, (0..24).map(|i| first + i * H).collect::<Vec<_>>());
    assert_eq!(*ts.last().unwrap(), dt(2021, 1, 1, 23).timestamp_millis());

    let calls = h.controller.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!((calls[0].since, calls[0].limit), (first, 24));
}

#[tokio::test]
async fn pagination_covers_gap_without_holes_or_overlap() {
    let h = harness(exchange(), |b| b.page_size(10).window_concurrency(3));
    let results = h
        .serie
        .sync(BINANCE, &[BTC], &["1h"], at(0), at(95 * H))
        .await
        .unwrap();

    assert_eq!(results[0].windows_planned, 10);
    assert_eq!(results[0].candles_appended, 95);
    assert_eq!(
        stored_ts(&h.store, &key(BTC, Interval::I1h)),
        (0..95).map(|i| i * H).collect::<Vec<_>>()
    );

    let mut since: Vec<i64> = h.controller.calls().await.iter().map(|c| c.since).collect();
    since.sort_unstable();
    assert_eq!(since, (0..10).map(|k| k * 10 * H).collect::<Vec<_>>());
}

#[tokio::test]
async fn page_size_is_capped_by_source_limit() {
    let h = harness(exchange().with_page_limit(5), |b| b.page_size(100));
    let results = h
        .serie
        .sync(BINANCE, &[BTC], &["1h"], at(0), at(12 * H))
        .await
        .unwrap();
    assert_eq!(results[0].windows_planned, 3);
    assert_eq!(results[0].candles_appended, 12);
}

#[tokio::test]
async fn results_follow_intervals_then_symbols() {
    let h = harness(exchange(), |b| b.key_concurrency(4));
    let results = h
        .serie
        .sync(BINANCE, &[ETH, BTC], &["1d", "1h"], at(0), at(48 * H))
        .await
        .unwrap();
    let keys: Vec<_> = results.iter().map(|r| r.key.clone()).collect();
    assert_eq!(
        keys,
        vec![
            key(ETH, Interval::D1),
            key(BTC, Interval::D1),
            key(ETH, Interval::I1h),
            key(BTC, Interval::I1h),
        ]
    );
    assert!(results.iter().all(serie::SyncResult::is_ok));
    assert_eq!(results[0].candles_appended, 2);
    assert_eq!(results[3].candles_appended, 48);
}

#[tokio::test]
async fn sync_builder_runs_with_defaults() {
    let h = harness(exchange().with_latest(30 * H), |b| b.default_start(at(0)));
    let results = h
        .serie
        .sync_builder(BINANCE)
        .symbols(&[BTC])
        .unwrap()
        .interval(Interval::I1h)
        .run()
        .await
        .unwrap();
    // End defaults to now; the mock has no data past its latest bound.
    assert_eq!(results[0].status, SyncStatus::Success);
    assert_eq!(results[0].candles_appended, 30);
}

#[tokio::test]
async fn monthly_backfill_steps_by_calendar_months() {
    let h = harness(exchange(), |b| b.page_size(5));
    let k = key(BTC, Interval::Mo1);
    let results = h
        .serie
        .sync(BINANCE, &[BTC], &["1M"], dt(2021, 1, 15, 0), dt(2023, 1, 1, 0))
        .await
        .unwrap();
    let r = &results[0];
    assert_eq!(r.status, SyncStatus::Success);
    assert_eq!(r.windows_planned, 5);
    // February 2021 through December 2022.
    assert_eq!(r.candles_appended, 23);

    let feb = dt(2021, 2, 1, 0).timestamp_millis();
    let expected: Vec<i64> = (0..23).map(|i| Interval::Mo1.advance(feb, i)).collect();
    assert_eq!(stored_ts(&h.store, &k), expected);
    let gaps = h.serie.gaps(&k, 0, dt(2024, 1, 1, 0).timestamp_millis()).unwrap();
    assert!(gaps.is_empty(), "{gaps:?}");

    let again = h
        .serie
        .sync(BINANCE, &[BTC], &["1M"], dt(2021, 1, 15, 0), dt(2023, 3, 1, 0))
        .await
        .unwrap();
    assert_eq!(again[0].status, SyncStatus::Success);
    assert_eq!(again[0].candles_appended, 2);
    assert_eq!(
        stored_ts(&h.store, &k).last().copied(),
        Some(dt(2023, 2, 1, 0).timestamp_millis())
    );
}
