use std::fs;
use std::sync::Arc;

use crate::helpers::{BINANCE, BTC, ETH, H, at, exchange, harness, hourly, key};
use serie::{CsvStore, Interval, Serie, SerieError, SeriesStore, SyncStatus};
use serie_mock::DynamicMockSource;

fn csv_serie(root: &std::path::Path, rebuild: bool) -> (Serie, Arc<CsvStore>) {
    let (source, _controller) = DynamicMockSource::new_with_controller(exchange());
    let store = Arc::new(CsvStore::new(root));
    let serie = Serie::builder()
        .with_source(source)
        .store(Arc::clone(&store) as Arc<dyn SeriesStore>)
        .backoff(None)
        .rebuild_corrupted(rebuild)
        .build()
        .unwrap();
    (serie, store)
}

fn write_disordered(store: &CsvStore) {
    let path = store.path_for(&key(BTC, Interval::I1h));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        &path,
        "date,open,high,low,close,volume\n7200000,1,1,1,1,1\n3600000,1,1,1,1,1\n",
    )
    .unwrap();
}

#[tokio::test]
async fn corrupted_series_fails_and_others_continue() {
    let dir = tempfile::tempdir().unwrap();
    let (serie, store) = csv_serie(dir.path(), false);
    write_disordered(&store);

    let results = serie
        .sync(BINANCE, &[BTC, ETH], &["1h"], at(0), at(10 * H))
        .await
        .unwrap();
    assert_eq!(results[0].status, SyncStatus::Failed);
    assert!(matches!(results[0].error, Some(SerieError::StoreCorrupted { .. })));
    assert_eq!(results[1].status, SyncStatus::Success);
    assert_eq!(store.tail(&key(ETH, Interval::I1h), 100).unwrap().len(), 10);

    // The corrupted file is left untouched.
    let text = fs::read_to_string(store.path_for(&key(BTC, Interval::I1h))).unwrap();
    assert_eq!(text.lines().count(), 3);
}

#[tokio::test]
async fn corrupted_series_is_rebuilt_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let (serie, store) = csv_serie(dir.path(), true);
    write_disordered(&store);

    let results = serie
        .sync(BINANCE, &[BTC], &["1h"], at(0), at(10 * H))
        .await
        .unwrap();
    assert_eq!(results[0].status, SyncStatus::Success);
    assert_eq!(results[0].candles_appended, 7);

    let ts: Vec<i64> = store
        .tail(&key(BTC, Interval::I1h), 100)
        .unwrap()
        .iter()
        .map(|c| c.ts)
        .collect();
    assert_eq!(ts, (1..10).map(|i| i * H).collect::<Vec<_>>());
}

#[tokio::test]
async fn csv_series_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (serie, _) = csv_serie(dir.path(), false);
        let first = serie
            .sync(BINANCE, &[BTC], &["1h", "1d"], at(0), at(72 * H))
            .await
            .unwrap();
        assert!(first.iter().all(|r| r.status == SyncStatus::Success));
    }
    let (serie, _) = csv_serie(dir.path(), false);
    let again = serie
        .sync(BINANCE, &[BTC], &["1h", "1d"], at(0), at(72 * H))
        .await
        .unwrap();
    assert!(again.iter().all(|r| r.status == SyncStatus::NoGap));

    let inventory = serie.inventory().unwrap();
    let rows: Vec<(Interval, usize)> = inventory
        .iter()
        .map(|s| (s.key.interval, s.rows))
        .collect();
    assert_eq!(rows, vec![(Interval::I1h, 72), (Interval::D1, 3)]);
    assert_eq!(inventory[0].key.symbol, BTC);
    assert_eq!(inventory[0].last_ts, Some(71 * H));
}

#[test]
fn gaps_report_holes_in_stored_series() {
    let h = harness(exchange(), |b| b);
    let k = key(BTC, Interval::I1h);
    let mut candles = hourly(BTC, 0, 3 * H);
    candles.extend(hourly(BTC, 5 * H, 8 * H));
    h.seed(&k, candles);

    assert_eq!(h.serie.gaps(&k, 0, 10 * H).unwrap(), vec![(3 * H, 5 * H)]);
    assert!(h.serie.gaps(&k, 5 * H, 10 * H).unwrap().is_empty());
}
