use crate::helpers::{BINANCE, BTC, ETH, H, at, exchange, harness, hourly, key, stored_ts};
use serie::{Decimal, Interval, SeriesStore, SyncStatus};

#[tokio::test]
async fn second_run_without_new_data_is_a_no_op() {
    let h = harness(exchange(), |b| b.page_size(7));
    let first = h
        .serie
        .sync(BINANCE, &[BTC, ETH], &["1h", "4h"], at(0), at(40 * H))
        .await
        .unwrap();
    assert!(first.iter().all(|r| r.status == SyncStatus::Success));

    h.controller.clear_calls().await;
    let second = h
        .serie
        .sync(BINANCE, &[BTC, ETH], &["1h", "4h"], at(0), at(40 * H))
        .await
        .unwrap();
    assert!(second.iter().all(|r| r.status == SyncStatus::NoGap));
    assert!(second.iter().all(|r| r.candles_appended == 0));
    assert!(h.controller.calls().await.is_empty());
}

#[tokio::test]
async fn resume_refetches_last_bar_and_reaches_target() {
    let h = harness(exchange(), |b| b);
    let k = key(BTC, Interval::I1h);
    let t = 9 * H;
    h.seed(&k, hourly(BTC, 0, t + H));

    let results = h
        .serie
        .sync(BINANCE, &[BTC], &["1h"], at(0), at(t + 5 * H))
        .await
        .unwrap();
    assert_eq!(results[0].status, SyncStatus::Success);
    assert_eq!(results[0].candles_appended, 4);
    assert_eq!(results[0].revised, 0);

    let calls = h.controller.calls().await;
    assert!((t - H..=t).contains(&calls[0].since), "since={}", calls[0].since);

    let last = h.store.last_timestamp(&k).unwrap().unwrap();
    assert!(last + H >= t + 5 * H);
    assert_eq!(stored_ts(&h.store, &k), (0..14).map(|i| i * H).collect::<Vec<_>>());
}

#[tokio::test]
async fn healed_bars_report_revisions_without_rewriting() {
    let h = harness(exchange(), |b| b.heal_bars(2));
    let k = key(BTC, Interval::I1h);
    let mut seeded = hourly(BTC, 0, 10 * H);
    // The newest stored bar was still open when stored.
    let open_bar = seeded.last_mut().unwrap();
    open_bar.close += Decimal::ONE;
    open_bar.high += Decimal::ONE;
    let stale = open_bar.clone();
    h.seed(&k, seeded);

    let results = h
        .serie
        .sync(BINANCE, &[BTC], &["1h"], at(0), at(12 * H))
        .await
        .unwrap();
    assert_eq!(results[0].revised, 1);
    assert_eq!(results[0].candles_appended, 2);
    assert_eq!(h.controller.calls().await[0].since, 7 * H);

    let tail = h.store.tail(&k, 3).unwrap();
    assert_eq!(tail[0], stale);
}

#[tokio::test]
async fn new_remote_data_extends_series_incrementally() {
    let mock = exchange().with_latest(24 * H);
    let handle = mock.clone();
    let h = harness(mock, |b| b);
    let k = key(ETH, Interval::I1h);

    let first = h
        .serie
        .sync(BINANCE, &[ETH], &["1h"], at(0), at(48 * H))
        .await
        .unwrap();
    assert_eq!(first[0].candles_appended, 24);

    handle.set_latest(30 * H);
    let second = h
        .serie
        .sync(BINANCE, &[ETH], &["1h"], at(0), at(48 * H))
        .await
        .unwrap();
    assert_eq!(second[0].status, SyncStatus::Success);
    assert_eq!(second[0].candles_appended, 6);
    assert_eq!(stored_ts(&h.store, &k), (0..30).map(|i| i * H).collect::<Vec<_>>());
}
