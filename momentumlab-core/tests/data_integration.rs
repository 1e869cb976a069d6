//! Integration tests for the data pipeline.
//!
//! Tests:
//! 1. A network fetch is cached, and the next chain is served from the cache
//! 2. A chain whose sources all fail lists every failure
//! 3. Synthetic data runs end to end through simulator and analyzer
//! 4. Universe discovery feeds the scanner

use chrono::NaiveDate;
use momentumlab_core::data::{
    align_closes, CacheSource, DailyClose, DataError, PriceCache, PriceSource, SourceChain,
    SourceKind, SyntheticSource,
};
use momentumlab_core::engine::{run, BacktestConfig};
use momentumlab_core::scanner::{scan, ScanConfig};
use momentumlab_core::universe::{discover_universe, StaticUniverse, UniverseFile};
use momentumlab_core::{analyze, PriceTable};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Helpers ──────────────────────────────────────────────────────────

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn tickers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Stand-in for a network source: closes with gaps, aligned the same way the
/// HTTP sources align theirs.
struct FakeRemote {
    calls: Arc<AtomicUsize>,
}

impl PriceSource for FakeRemote {
    fn name(&self) -> &str {
        "fake_remote"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Yahoo
    }

    fn fetch(&self, tickers: &[String], start: NaiveDate, _end: NaiveDate) -> Result<PriceTable, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut series = BTreeMap::new();
        for (k, ticker) in tickers.iter().enumerate() {
            let closes = (0..40)
                // Every seventh day missing for the second ticker.
                .filter(|i| k == 0 || i % 7 != 3)
                .map(|i| DailyClose {
                    date: start + chrono::Duration::days(i),
                    close: 100.0 + (k as f64 + 1.0) * i as f64,
                })
                .collect();
            series.insert(ticker.clone(), closes);
        }
        align_closes(tickers, &series)
    }
}

// ── 1. Cache write-back and hit ──────────────────────────────────────

#[test]
fn network_fetch_is_cached_then_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(PriceCache::new(dir.path()));
    let universe = tickers(&["AAA", "BBB"]);
    let (start, end) = (day(2024, 1, 1), day(2024, 3, 1));

    let calls = Arc::new(AtomicUsize::new(0));
    let chain = SourceChain::new()
        .with_source(CacheSource::new(Arc::clone(&cache)))
        .with_source(FakeRemote { calls: Arc::clone(&calls) })
        .with_write_back(Arc::clone(&cache));

    let first = chain.fetch(&universe, start, end).unwrap();
    assert_eq!(first.source_name, "fake_remote");
    assert_eq!(first.table.len(), 40);
    // Gaps were forward-filled.
    assert_eq!(first.table.price("BBB", 3), first.table.price("BBB", 2));

    let second = chain.fetch(&universe, start, end).unwrap();
    assert_eq!(second.source_kind, SourceKind::Cache);
    assert_eq!(second.table, first.table);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let entries = cache.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].source, "fake_remote");
}

// ── 2. Exhausted chain ───────────────────────────────────────────────

#[test]
fn exhausted_chain_reports_every_source() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(PriceCache::new(dir.path()));
    let chain = SourceChain::new().with_source(CacheSource::new(cache));

    let err = chain
        .fetch(&tickers(&["AAA"]), day(2024, 1, 1), day(2024, 2, 1))
        .unwrap_err();
    match err {
        DataError::AllSourcesFailed { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, "cache");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ── 3. Synthetic end-to-end ──────────────────────────────────────────

#[test]
fn synthetic_prices_run_end_to_end() {
    let universe = StaticUniverse::default();
    let found = discover_universe(&universe, &universe).unwrap();

    let chain = SourceChain::new().with_source(SyntheticSource::new(11));
    let fetched = chain.fetch(&found.tickers, day(2023, 1, 1), day(2024, 1, 1)).unwrap();
    assert_eq!(fetched.source_kind, SourceKind::Synthetic);

    let prices = Arc::new(fetched.table);
    let config = BacktestConfig::new(20, 10, 10_000.0, found.tickers.clone(), Arc::clone(&prices));
    let result = run(&config).unwrap();
    assert_eq!(result.equity_curve.len(), config.period_count() + 1);

    let summary = analyze(&result.equity_curve, config.holding);
    assert!(summary.roi.is_finite());
    assert!((0.0..1.0).contains(&summary.max_drawdown));
    assert!(summary.sharpe.is_finite());
}

// ── 4. Universe file into scanner ────────────────────────────────────

#[test]
fn universe_file_feeds_scanner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("universe.toml");
    std::fs::write(&path, "tickers = [\"up\", \"down\"]\n").unwrap();
    let file = UniverseFile::from_file(&path).unwrap();
    let found = discover_universe(&file, &StaticUniverse::default()).unwrap();
    assert_eq!(found.source, "file");

    let rows = 30;
    let dates = (0..rows).map(|i| day(2024, 1, 1) + chrono::Duration::days(i)).collect();
    let prices = PriceTable::new(
        dates,
        vec![
            ("UP".into(), (0..rows).map(|i| 10.0 * 1.01_f64.powi(i as i32)).collect()),
            ("DOWN".into(), (0..rows).map(|i| 10.0 * 0.99_f64.powi(i as i32)).collect()),
        ],
    )
    .unwrap();

    let picks = scan(&prices, &found.tickers, &ScanConfig::default());
    assert_eq!(picks.len(), 1);
    assert_eq!(picks[0].ticker, "UP");
}
