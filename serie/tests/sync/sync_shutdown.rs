use std::time::Duration;

use crate::helpers::{BINANCE, BTC, ETH, H, at, exchange, harness, key};
use serie::{Interval, SerieError, SyncStatus};
use serie_mock::MockBehavior;

#[tokio::test]
async fn triggered_shutdown_skips_every_series() {
    let h = harness(exchange(), |b| b);
    let handle = h.serie.shutdown_handle();
    handle.trigger();
    assert!(handle.is_triggered());

    let results = h
        .serie
        .sync(BINANCE, &[BTC, ETH], &["1h"], at(0), at(10 * H))
        .await
        .unwrap();
    assert!(results.iter().all(|r| r.status == SyncStatus::Skipped));
    assert!(results.iter().all(|r| r.error == Some(SerieError::Shutdown)));
    assert!(h.controller.calls().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_mid_run_appends_nothing_for_interrupted_series() {
    let h = harness(exchange(), |b| {
        b.page_size(1).window_concurrency(1).key_concurrency(1)
    });
    h.controller
        .set_symbol_behavior(BTC, MockBehavior::Delay(Duration::from_secs(1)))
        .await;
    let handle = h.serie.shutdown_handle();

    let (results, ()) = tokio::join!(
        h.serie
            .sync(BINANCE, &[BTC, ETH], &["1h"], at(0), at(5 * H)),
        async {
            tokio::time::sleep(Duration::from_millis(1_500)).await;
            handle.trigger();
        }
    );
    let results = results.unwrap();

    // The in-flight window finished; the rest were cancelled.
    assert_eq!(h.controller.calls_for(BTC).await.len(), 2);
    let btc = &results[0];
    assert_eq!(btc.status, SyncStatus::Skipped);
    assert_eq!(btc.windows_planned, 5);
    assert_eq!(btc.candles_appended, 0);
    assert_eq!(h.store.len(&key(BTC, Interval::I1h)), 0);

    let eth = &results[1];
    assert_eq!(eth.status, SyncStatus::Skipped);
    assert_eq!(eth.windows_planned, 0);
    assert!(h.controller.calls_for(ETH).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn run_deadline_skips_remaining_work() {
    let h = harness(exchange(), |b| {
        b.page_size(1)
            .window_concurrency(1)
            .request_timeout(Duration::from_millis(2_500))
    });
    h.controller
        .set_symbol_behavior(BTC, MockBehavior::Delay(Duration::from_secs(1)))
        .await;

    let results = h
        .serie
        .sync(BINANCE, &[BTC], &["1h"], at(0), at(5 * H))
        .await
        .unwrap();
    let r = &results[0];
    assert_eq!(r.status, SyncStatus::Skipped);
    assert!(matches!(
        r.error,
        Some(SerieError::Timeout { ref connector, timeout_ms: 2_500 }) if connector == "sync"
    ));
    assert_eq!(h.controller.calls_for(BTC).await.len(), 3);
    assert_eq!(h.store.len(&key(BTC, Interval::I1h)), 0);
}
