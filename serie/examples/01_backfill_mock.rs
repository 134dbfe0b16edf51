use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serie::{RateLimitConfig, Serie, SyncStatus, failed_keys};
use serie_mock::MockExchange;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=serie=debug shows window retries and store commits.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "serie=info".into()))
        .init();

    // 1. A synthetic exchange with two listings. "DOGE/USDT" is not listed and will fail.
    let exchange = MockExchange::new("binance")
        .with_symbol("BTC/USDT", 0)
        .with_symbol("ETH/USDT", 0);

    // 2. Store series as CSV files in a scratch directory.
    let root = std::env::temp_dir().join("serie-demo");
    let serie = Serie::builder()
        .with_source(Arc::new(exchange))
        .with_rate_limit(RateLimitConfig {
            limit: 600,
            window: Duration::from_secs(60),
        })
        .with_cooldown(Duration::from_secs(5))
        .csv_root(&root)
        .build()?;

    let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).single().ok_or("bad start")?;
    let end = Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).single().ok_or("bad end")?;

    // 3. Backfill, then run again: the second pass only re-checks the last bar.
    for pass in 1..=2 {
        let results = serie
            .sync_builder("binance")
            .symbols(&["BTC/USDT", "ETH/USDT", "DOGE/USDT"])?
            .intervals(&["1h", "1d"])?
            .start(start)
            .end(end)
            .run()
            .await?;

        println!("\n## Pass {pass}");
        for r in &results {
            let status = match r.status {
                SyncStatus::NoGap => "up to date".to_string(),
                SyncStatus::Success => format!("+{} candles", r.candles_appended),
                other => format!(
                    "{other:?}: {}",
                    r.error.as_ref().map(ToString::to_string).unwrap_or_default()
                ),
            };
            println!(" - {:<28} {status}", r.key.to_string());
        }
        println!("Retry later: {:?}", failed_keys(&results));
    }

    // 4. What is on disk now.
    println!("\n## Inventory under {}", root.display());
    for s in serie.inventory()? {
        println!(" - {}: {} rows", s.key, s.rows);
    }
    Ok(())
}
