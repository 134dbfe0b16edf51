use std::sync::Arc;

use crate::helpers::{BINANCE, BTC, ETH, H, at, exchange, harness};
use serie::{Interval, MemoryStore, Serie, SerieError};
use serie_mock::MockExchange;

#[tokio::test]
async fn unknown_interval_fails_before_any_call() {
    let h = harness(exchange(), |b| b);
    let err = h
        .serie
        .sync(BINANCE, &[BTC], &["1h", "3h"], at(0), at(10 * H))
        .await
        .unwrap_err();
    assert_eq!(err, SerieError::unknown_interval("3h"));
    assert!(h.controller.calls().await.is_empty());
}

#[tokio::test]
async fn unknown_exchange_is_rejected() {
    let h = harness(exchange(), |b| b);
    let err = h
        .serie
        .sync("kraken", &[BTC], &["1h"], at(0), at(10 * H))
        .await
        .unwrap_err();
    assert!(matches!(err, SerieError::UnknownExchange { ref name } if name == "kraken"));
    assert!(h.controller.calls().await.is_empty());
}

#[tokio::test]
async fn interval_unsupported_by_source_is_rejected() {
    let mock = exchange().with_intervals(&[Interval::I1h, Interval::D1]);
    let h = harness(mock, |b| b);
    let err = h
        .serie
        .sync(BINANCE, &[BTC], &["1h", "1M"], at(0), at(10 * H))
        .await
        .unwrap_err();
    assert!(matches!(err, SerieError::Unsupported { .. }), "{err:?}");
    assert!(h.controller.calls().await.is_empty());
}

#[tokio::test]
async fn symbol_list_problems_are_rejected() {
    let h = harness(exchange(), |b| b);
    let empty: [&str; 0] = [];
    for symbols in [&empty[..], &[BTC, ETH, BTC][..], &[""][..]] {
        let err = h
            .serie
            .sync(BINANCE, symbols, &["1h"], at(0), at(10 * H))
            .await
            .unwrap_err();
        assert!(matches!(err, SerieError::InvalidArg(_)), "{err:?}");
    }
    let err = h
        .serie
        .sync(BINANCE, &[BTC], &["1h", "1h"], at(0), at(10 * H))
        .await
        .unwrap_err();
    assert!(matches!(err, SerieError::InvalidArg(_)), "{err:?}");
    assert!(h.controller.calls().await.is_empty());
}

#[tokio::test]
async fn start_must_precede_end() {
    let h = harness(exchange(), |b| b);
    for (start, end) in [(10 * H, 10 * H), (10 * H, 0)] {
        let err = h
            .serie
            .sync(BINANCE, &[BTC], &["1h"], at(start), at(end))
            .await
            .unwrap_err();
        assert!(matches!(err, SerieError::InvalidArg(_)), "{err:?}");
    }
}

#[test]
fn sync_builder_rejects_duplicates_eagerly() {
    let h = harness(exchange(), |b| b);
    assert!(
        h.serie
            .sync_builder(BINANCE)
            .symbols(&[BTC, BTC])
            .is_err()
    );
    let dup = h
        .serie
        .sync_builder(BINANCE)
        .add_symbol(BTC)
        .and_then(|b| b.add_symbol(BTC));
    assert!(matches!(dup, Err(SerieError::InvalidArg(_))));
    assert!(matches!(
        h.serie.sync_builder(BINANCE).intervals(&["1h", "90m"]),
        Err(SerieError::UnknownInterval { .. })
    ));
}

#[test]
fn builder_requires_sources_and_store() {
    let store = Arc::new(MemoryStore::new());
    assert!(matches!(
        Serie::builder().store(store.clone()).build(),
        Err(SerieError::InvalidArg(_))
    ));
    assert!(matches!(
        Serie::builder()
            .with_source(Arc::new(MockExchange::new(BINANCE)))
            .build(),
        Err(SerieError::InvalidArg(_))
    ));
    assert!(matches!(
        Serie::builder()
            .with_source(Arc::new(MockExchange::new(BINANCE)))
            .with_source(Arc::new(MockExchange::new(BINANCE)))
            .store(store.clone())
            .build(),
        Err(SerieError::InvalidArg(_))
    ));
    assert!(matches!(
        Serie::builder()
            .with_source(Arc::new(MockExchange::new(BINANCE)))
            .store(store)
            .window_concurrency(0)
            .build(),
        Err(SerieError::InvalidArg(_))
    ));
}

#[test]
fn registered_exchanges_are_listed() {
    let serie = Serie::builder()
        .with_source(Arc::new(MockExchange::new("kucoin")))
        .with_source(Arc::new(MockExchange::new(BINANCE)))
        .store(Arc::new(MemoryStore::new()))
        .build()
        .unwrap();
    assert_eq!(serie.exchanges(), vec![BINANCE, "kucoin"]);
    assert_eq!(serie.source("kucoin").unwrap().page_limit(), 1500);
    assert!(serie.source("bitget").is_none());
}
