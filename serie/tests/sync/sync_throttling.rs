use std::time::Duration;

use crate::helpers::{BINANCE, BTC, ETH, H, at, exchange, harness};
use serie::{RateLimitConfig, SerieError, SyncStatus};
use serie_mock::MockBehavior;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn rate_limit_is_shared_by_all_series_of_an_exchange() {
    let h = harness(exchange(), |b| {
        b.page_size(2)
            .key_concurrency(2)
            .with_rate_limit(RateLimitConfig {
                limit: 1,
                window: Duration::from_secs(1),
            })
    });
    let started = Instant::now();
    let results = h
        .serie
        .sync(BINANCE, &[BTC, ETH], &["1h"], at(0), at(6 * H))
        .await
        .unwrap();
    assert!(results.iter().all(|r| r.status == SyncStatus::Success));
    // Six calls, one token per second, the first one free.
    assert_eq!(h.controller.calls().await.len(), 6);
    assert!(started.elapsed() >= Duration::from_secs(5), "{:?}", started.elapsed());
}

#[tokio::test(start_paused = true)]
async fn exchange_concurrency_bounds_calls_across_series() {
    let run = |limit: usize| async move {
        let h = harness(exchange(), |b| {
            b.page_size(1)
                .window_concurrency(4)
                .key_concurrency(2)
                .exchange_concurrency(limit)
        });
        for sym in [BTC, ETH] {
            h.controller
                .set_symbol_behavior(sym, MockBehavior::Delay(Duration::from_secs(1)))
                .await;
        }
        let started = Instant::now();
        let results = h
            .serie
            .sync(BINANCE, &[BTC, ETH], &["1h"], at(0), at(4 * H))
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.status == SyncStatus::Success));
        started.elapsed()
    };

    // Eight one-second calls.
    assert!(run(1).await >= Duration::from_secs(8));
    assert!(run(8).await < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn cooldown_pauses_the_exchange_after_throttling() {
    let h = harness(exchange(), |b| {
        b.with_cooldown(Duration::from_secs(5)).max_attempts(2)
    });
    h.controller
        .set_symbol_behavior(
            BTC,
            MockBehavior::FailTimes(1, SerieError::rate_limited(BINANCE, None)),
        )
        .await;
    let started = Instant::now();
    let results = h
        .serie
        .sync(BINANCE, &[BTC], &["1h"], at(0), at(10 * H))
        .await
        .unwrap();
    assert_eq!(results[0].status, SyncStatus::Success);
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(
        h.serie
            .source(BINANCE)
            .unwrap()
            .fetch_candles(ETH, serie::Interval::I1h, 0, 1)
            .await
            .is_ok()
    );
}

#[tokio::test(start_paused = true)]
async fn waiting_for_a_token_is_not_a_call_timeout() {
    let h = harness(exchange(), |b| {
        b.page_size(1)
            .provider_timeout(Duration::from_secs(10))
            .with_rate_limit(RateLimitConfig {
                limit: 1,
                window: Duration::from_secs(60),
            })
    });
    let started = Instant::now();
    let results = h
        .serie
        .sync(BINANCE, &[BTC], &["1h"], at(0), at(2 * H))
        .await
        .unwrap();
    let r = &results[0];
    assert_eq!(r.status, SyncStatus::Success, "{:?}", r.windows_failed);
    assert_eq!(r.candles_appended, 2);
    assert_eq!(h.controller.calls().await.len(), 2);
    assert!(started.elapsed() >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn long_cooldown_delays_sibling_series_without_failing_them() {
    let h = harness(exchange(), |b| {
        b.key_concurrency(2)
            .with_cooldown(Duration::from_secs(5))
            .provider_timeout(Duration::from_secs(10))
    });
    h.controller
        .set_symbol_behavior(
            BTC,
            MockBehavior::FailTimes(1, SerieError::rate_limited(BINANCE, Some(60_000))),
        )
        .await;
    // BTC is throttled on its first call, so ETH's call waits out the
    // 60s cooldown, six times the call timeout.
    let started = Instant::now();
    let results = h
        .serie
        .sync(BINANCE, &[BTC, ETH], &["1h"], at(0), at(10 * H))
        .await
        .unwrap();
    for r in &results {
        assert_eq!(r.status, SyncStatus::Success, "{}: {:?}", r.key, r.windows_failed);
        assert_eq!(r.candles_appended, 10);
    }
    assert!(started.elapsed() >= Duration::from_secs(60));
}

#[test]
fn registered_source_keeps_the_timeout_innermost() {
    let h = harness(exchange(), |b| {
        b.with_rate_limit(RateLimitConfig::default())
            .with_cooldown(Duration::from_secs(5))
            .provider_timeout(Duration::from_secs(3))
    });
    let stack = h.serie.source_stack(BINANCE).unwrap();
    assert_eq!(
        stack.names(),
        vec![
            "CooldownSource",
            "RateLimitedSource",
            "TimeoutSource",
            "RawSource"
        ]
    );
    assert_eq!(stack.layers[2].config["timeout_ms"], 3_000);
    assert!(h.serie.source_stack("kraken").is_none());
}
