//! Universe resolution and price loading for the runner.
//!
//! Builds the standard source chain and resolves which tickers to trade.
//! Fallback policy, in order:
//! 1. Parquet cache (skipped with `force`)
//! 2. FinancialDatasets.ai when `FD_API_KEY` is set (skipped offline)
//! 3. Yahoo Finance chart API (skipped offline)
//! 4. Seeded synthetic prices, only when `synthetic` is enabled
//!
//! Results produced on synthetic data are tagged via [`LoadedPrices::is_synthetic`].

use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use momentumlab_core::data::{
    CacheSource, CircuitBreaker, DataError, FinancialDatasetsSource, PriceCache, PriceSource,
    SourceChain, SourceKind, SyntheticSource, YahooSource,
};
use momentumlab_core::universe::{
    discover_universe, normalize, DiscoveredUniverse, FinvizScreener, StaticUniverse,
    UniverseError, UniverseFile, UniverseSource,
};
use momentumlab_core::PriceTable;

use crate::config::DataSection;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("universe error: {0}")]
    Universe(#[from] UniverseError),

    #[error("no price source configured (offline without cache or synthetic)")]
    NoSources,

    #[error("none of the requested tickers have price data")]
    NoTickers,
}

/// Options controlling how prices are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub cache_dir: PathBuf,
    /// If true, never make network requests.
    pub offline: bool,
    /// Append the synthetic source to the end of the chain.
    pub synthetic: bool,
    pub synthetic_seed: u64,
    /// Skip the cache and refetch.
    pub force: bool,
}

impl LoadOptions {
    pub fn from_section(data: &DataSection, end: NaiveDate) -> Self {
        Self {
            start: data.start,
            end,
            cache_dir: data.cache_dir.clone(),
            offline: data.offline,
            synthetic: data.synthetic,
            synthetic_seed: data.synthetic_seed,
            force: false,
        }
    }
}

/// Prices ready for simulation, with provenance.
#[derive(Debug, Clone)]
pub struct LoadedPrices {
    pub prices: Arc<PriceTable>,
    /// Requested tickers that have data, in request order.
    pub universe: Vec<String>,
    /// Requested tickers the source could not supply.
    pub dropped: Vec<String>,
    pub source_name: String,
    pub source_kind: SourceKind,
    pub dataset_hash: String,
}

impl LoadedPrices {
    /// Wrap an already-built table; every column becomes part of the universe.
    pub fn from_table(table: PriceTable, source_name: impl Into<String>, source_kind: SourceKind) -> Self {
        let dataset_hash = table.dataset_hash();
        Self {
            universe: table.tickers().to_vec(),
            prices: Arc::new(table),
            dropped: Vec::new(),
            source_name: source_name.into(),
            source_kind,
            dataset_hash,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.source_kind == SourceKind::Synthetic
    }
}

/// Assemble the standard chain for `opts`.
pub fn build_chain(opts: &LoadOptions) -> Result<SourceChain, LoadError> {
    let cache = Arc::new(PriceCache::new(opts.cache_dir.clone()));
    let mut chain = SourceChain::new();

    if !opts.force {
        chain = chain.with_source(CacheSource::new(Arc::clone(&cache)));
    }
    if !opts.offline {
        let fd = FinancialDatasetsSource::from_env()?;
        if fd.is_available() {
            chain = chain.with_source(fd);
        }
        let breaker = Arc::new(CircuitBreaker::default_provider());
        chain = chain
            .with_source(YahooSource::new(breaker)?)
            .with_write_back(cache);
    }
    if opts.synthetic {
        chain = chain.with_source(SyntheticSource::new(opts.synthetic_seed));
    }

    if chain.is_empty() {
        return Err(LoadError::NoSources);
    }
    info!(sources = ?chain.source_names(), "price source chain ready");
    Ok(chain)
}

/// Which rows of a fetched table a load keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rows {
    /// From the first date where every ticker has a price (backtests).
    Complete,
    /// Every ticker's own history; younger tickers lead with `NaN` (scans).
    PerTicker,
}

/// Fetch `tickers` through `chain` and keep only the tickers that came back.
///
/// The table starts at the first date where every kept ticker has a price.
pub fn load_prices_with(
    chain: &SourceChain,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<LoadedPrices, LoadError> {
    load_rows_with(chain, tickers, start, end, Rows::Complete)
}

/// Like [`load_prices_with`], choosing which rows to keep.
pub fn load_rows_with(
    chain: &SourceChain,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
    rows: Rows,
) -> Result<LoadedPrices, LoadError> {
    let fetched = chain.fetch(tickers, start, end)?;
    let table = fetched.table;

    let (universe, dropped): (Vec<String>, Vec<String>) =
        tickers.iter().cloned().partition(|t| table.contains(t));
    if !dropped.is_empty() {
        warn!(?dropped, "tickers without price data removed from the universe");
    }
    if universe.is_empty() {
        return Err(LoadError::NoTickers);
    }

    let table = match rows {
        Rows::Complete => table.select(&universe).trim_leading_gaps(),
        Rows::PerTicker => table.select(&universe),
    };
    let dataset_hash = table.dataset_hash();
    Ok(LoadedPrices {
        prices: Arc::new(table),
        universe,
        dropped,
        source_name: fetched.source_name,
        source_kind: fetched.source_kind,
        dataset_hash,
    })
}

/// Build the standard chain for `opts` and load `tickers` through it.
pub fn load_prices(tickers: &[String], opts: &LoadOptions) -> Result<LoadedPrices, LoadError> {
    let chain = build_chain(opts)?;
    load_prices_with(&chain, tickers, opts.start, opts.end)
}

/// Load `tickers` for a live scan, keeping each ticker's full history so a
/// recent listing does not shorten everyone else's window.
pub fn load_scan_prices(tickers: &[String], opts: &LoadOptions) -> Result<LoadedPrices, LoadError> {
    let chain = build_chain(opts)?;
    load_rows_with(&chain, tickers, opts.start, opts.end, Rows::PerTicker)
}

/// Resolve the trading universe.
///
/// Explicit tickers win, then a universe file, then screener discovery with
/// the static default list as fallback. Offline runs skip the screener.
pub fn resolve_universe(data: &DataSection) -> Result<DiscoveredUniverse, LoadError> {
    if let Some(tickers) = &data.tickers {
        let tickers = normalize(tickers.iter().cloned());
        if tickers.is_empty() {
            return Err(UniverseError::Empty.into());
        }
        return Ok(DiscoveredUniverse {
            tickers,
            source: "config".to_string(),
        });
    }

    if let Some(path) = &data.universe_file {
        let file = UniverseFile::from_file(path)?;
        return Ok(DiscoveredUniverse {
            tickers: file.tickers()?,
            source: file.name().to_string(),
        });
    }

    let fallback = StaticUniverse::default();
    if data.offline {
        return Ok(DiscoveredUniverse {
            tickers: fallback.tickers()?,
            source: fallback.name().to_string(),
        });
    }
    Ok(discover_universe(&FinvizScreener::from_env(), &fallback)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use momentumlab_core::data::{align_ragged, DailyClose};
    use std::collections::BTreeMap;

    /// Source with one long-lived ticker and one listed on the last two days.
    struct Staggered;

    impl PriceSource for Staggered {
        fn name(&self) -> &str {
            "staggered"
        }
        fn kind(&self) -> SourceKind {
            SourceKind::Cache
        }
        fn fetch(&self, tickers: &[String], start: NaiveDate, _: NaiveDate) -> Result<PriceTable, DataError> {
            let day = |i: i64| start + chrono::Duration::days(i);
            let mut series = BTreeMap::new();
            series.insert(
                "OLD".to_string(),
                (0..6).map(|i| DailyClose { date: day(i), close: 10.0 + i as f64 }).collect(),
            );
            series.insert(
                "NEW".to_string(),
                (4..6).map(|i| DailyClose { date: day(i), close: 50.0 + i as f64 }).collect(),
            );
            align_ragged(tickers, &series)
        }
    }

    fn staggered_chain() -> SourceChain {
        SourceChain::new().with_source(Staggered)
    }

    fn opts_dates() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    fn offline_opts(dir: &std::path::Path, synthetic: bool) -> LoadOptions {
        LoadOptions {
            start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
            cache_dir: dir.to_path_buf(),
            offline: true,
            synthetic,
            synthetic_seed: 42,
            force: false,
        }
    }

    #[test]
    fn offline_chain_is_cache_then_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let chain = build_chain(&offline_opts(dir.path(), true)).unwrap();
        assert_eq!(chain.source_names(), vec!["cache", "synthetic"]);
    }

    #[test]
    fn forced_offline_without_synthetic_has_no_sources() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = offline_opts(dir.path(), false);
        opts.force = true;
        assert!(matches!(build_chain(&opts), Err(LoadError::NoSources)));
    }

    #[test]
    fn synthetic_load_tags_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let tickers = vec!["AAA".to_string(), "BBB".to_string()];
        let loaded = load_prices(&tickers, &offline_opts(dir.path(), true)).unwrap();
        assert!(loaded.is_synthetic());
        assert_eq!(loaded.source_name, "synthetic");
        assert_eq!(loaded.universe, tickers);
        assert!(loaded.dropped.is_empty());
        assert_eq!(loaded.dataset_hash, loaded.prices.dataset_hash());
    }

    #[test]
    fn backtest_load_starts_when_all_tickers_trade() {
        let (start, end) = opts_dates();
        let tickers = vec!["OLD".to_string(), "NEW".to_string()];
        let loaded = load_prices_with(&staggered_chain(), &tickers, start, end).unwrap();
        assert_eq!(loaded.prices.len(), 2);
        assert_eq!(loaded.prices.column("OLD"), Some(&[14.0, 15.0][..]));
        assert_eq!(loaded.dataset_hash, loaded.prices.dataset_hash());
    }

    #[test]
    fn per_ticker_load_keeps_full_history() {
        let (start, end) = opts_dates();
        let tickers = vec!["OLD".to_string(), "NEW".to_string()];
        let loaded = load_rows_with(&staggered_chain(), &tickers, start, end, Rows::PerTicker).unwrap();
        assert_eq!(loaded.prices.len(), 6);
        assert_eq!(loaded.prices.price("OLD", 0), Some(10.0));
        assert!(loaded.prices.price("NEW", 3).unwrap().is_nan());
        assert_eq!(loaded.prices.price("NEW", 5), Some(55.0));
    }

    #[test]
    fn explicit_tickers_are_normalized() {
        let data = DataSection {
            tickers: Some(vec![" nvda".into(), "AMD".into(), "NVDA".into()]),
            ..DataSection::default()
        };
        let found = resolve_universe(&data).unwrap();
        assert_eq!(found.tickers, vec!["NVDA", "AMD"]);
        assert_eq!(found.source, "config");
    }

    #[test]
    fn offline_universe_uses_static_default() {
        let data = DataSection {
            offline: true,
            ..DataSection::default()
        };
        let found = resolve_universe(&data).unwrap();
        assert_eq!(found.source, "static");
        assert_eq!(found.tickers.len(), 7);
    }
}
