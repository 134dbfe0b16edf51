use std::time::Duration;

use crate::helpers::{BINANCE, BTC, ETH, H, at, exchange, harness, key, stored_ts};
use serie::{Interval, SerieError, SyncStatus, failed_keys};
use serie_mock::MockBehavior;

#[tokio::test]
async fn missing_symbol_fails_alone() {
    let h = harness(exchange(), |b| b);
    let results = h
        .serie
        .sync(BINANCE, &["DOGE/USDT", ETH], &["1h"], at(0), at(10 * H))
        .await
        .unwrap();

    assert_eq!(results[0].status, SyncStatus::Failed);
    assert!(matches!(results[0].error, Some(SerieError::NotFound { .. })));
    assert_eq!(results[0].candles_appended, 0);
    assert_eq!(h.store.len(&key("DOGE/USDT", Interval::I1h)), 0);

    assert_eq!(results[1].status, SyncStatus::Success);
    assert_eq!(h.store.len(&key(ETH, Interval::I1h)), 10);
    assert_eq!(failed_keys(&results), vec![key("DOGE/USDT", Interval::I1h)]);
}

#[tokio::test]
async fn transient_errors_are_retried_with_same_parameters() {
    let h = harness(exchange(), |b| b.max_attempts(3));
    h.controller
        .set_symbol_behavior(BTC, MockBehavior::FailTimes(2, SerieError::transient("502")))
        .await;
    let results = h
        .serie
        .sync(BINANCE, &[BTC], &["1h"], at(0), at(10 * H))
        .await
        .unwrap();

    assert_eq!(results[0].status, SyncStatus::Success);
    assert_eq!(results[0].candles_appended, 10);
    let calls = h.controller.calls().await;
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c == &calls[0]));
}

#[tokio::test]
async fn exhausted_window_commits_prefix_and_next_run_fills_hole() {
    let h = harness(exchange(), |b| b.page_size(10).max_attempts(2));
    h.controller
        .set_window_behavior(BTC, 20 * H, MockBehavior::Fail(SerieError::transient("flaky")))
        .await;

    let first = h
        .serie
        .sync(BINANCE, &[BTC], &["1h"], at(0), at(50 * H))
        .await
        .unwrap();
    let r = &first[0];
    assert_eq!(r.status, SyncStatus::PartialFailure);
    assert_eq!(r.windows_planned, 5);
    assert_eq!(r.windows_failed.len(), 1);
    assert_eq!(r.windows_failed[0].window.since, 20 * H);
    assert_eq!(r.windows_failed[0].attempts, 2);
    assert!(matches!(
        r.error,
        Some(SerieError::WindowsFailed { planned: 5, failed: 1, .. })
    ));
    // Windows after the hole were fetched but not stored.
    assert_eq!(r.candles_appended, 20);
    let k = key(BTC, Interval::I1h);
    assert_eq!(stored_ts(&h.store, &k), (0..20).map(|i| i * H).collect::<Vec<_>>());

    h.controller.clear_all_behaviors().await;
    let second = h
        .serie
        .sync(BINANCE, &[BTC], &["1h"], at(0), at(50 * H))
        .await
        .unwrap();
    assert_eq!(second[0].status, SyncStatus::Success);
    assert_eq!(second[0].candles_appended, 30);
    let min_since = h.controller.calls().await.iter().map(|c| c.since).min();
    assert_eq!(min_since, Some(18 * H));
    assert_eq!(stored_ts(&h.store, &k), (0..50).map(|i| i * H).collect::<Vec<_>>());
}

#[tokio::test]
async fn auth_error_is_fatal_without_retry() {
    let h = harness(exchange(), |b| b.max_attempts(5));
    h.controller
        .set_symbol_behavior(BTC, MockBehavior::Fail(SerieError::Auth("bad key".into())))
        .await;
    let results = h
        .serie
        .sync(BINANCE, &[BTC, ETH], &["1h"], at(0), at(10 * H))
        .await
        .unwrap();

    assert_eq!(results[0].status, SyncStatus::Failed);
    assert_eq!(results[0].windows_planned, 1);
    assert_eq!(results[0].windows_failed[0].attempts, 1);
    assert_eq!(h.controller.calls_for(BTC).await.len(), 1);
    assert_eq!(results[1].status, SyncStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn hung_calls_time_out_and_fail_the_window() {
    let h = harness(exchange(), |b| {
        b.provider_timeout(Duration::from_secs(2)).max_attempts(2)
    });
    h.controller.set_symbol_behavior(BTC, MockBehavior::Hang).await;
    let results = h
        .serie
        .sync(BINANCE, &[BTC], &["1h"], at(0), at(10 * H))
        .await
        .unwrap();

    let r = &results[0];
    assert_eq!(r.status, SyncStatus::PartialFailure);
    assert_eq!(r.candles_appended, 0);
    assert!(matches!(
        r.windows_failed[0].error,
        SerieError::Timeout { ref connector, timeout_ms: 2_000 } if connector == BINANCE
    ));
    assert_eq!(r.windows_failed[0].attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_hint_delays_the_retry() {
    let h = harness(exchange(), |b| b.max_attempts(2));
    h.controller
        .set_symbol_behavior(
            BTC,
            MockBehavior::FailTimes(1, SerieError::rate_limited(BINANCE, Some(4_000))),
        )
        .await;
    let started = tokio::time::Instant::now();
    let results = h
        .serie
        .sync(BINANCE, &[BTC], &["1h"], at(0), at(10 * H))
        .await
        .unwrap();
    assert_eq!(results[0].status, SyncStatus::Success);
    assert!(started.elapsed() >= Duration::from_secs(4));
}
