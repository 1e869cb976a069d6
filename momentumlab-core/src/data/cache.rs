//! Parquet cache of aligned price tables.
//!
//! Layout: `{cache_dir}/prices_{key}.parquet` plus `prices_{key}.meta.json`,
//! where `key` is a BLAKE3 digest of the sorted ticker set and the start date.
//! Each file is one wide table: a `date` column and one `f64` column per ticker.
//!
//! Writes are atomic (write to .tmp, rename into place). A file that fails to
//! load is quarantined (`.quarantined`) and treated as a miss.

use super::provider::{DataError, PriceSource, SourceKind};
use crate::domain::PriceTable;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Metadata sidecar for one cached table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub key: String,
    /// Requested tickers, sorted.
    pub tickers: Vec<String>,
    /// Requested start date.
    pub start: NaiveDate,
    /// Tickers actually present in the table, in column order.
    pub columns: Vec<String>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub rows: usize,
    pub dataset_hash: String,
    /// Name of the source the table was fetched from.
    pub source: String,
    pub cached_at: chrono::NaiveDateTime,
}

/// Cache key for a ticker set and start date. Order of `tickers` is irrelevant.
pub fn cache_key(tickers: &[String], start: NaiveDate) -> String {
    let mut sorted: Vec<&str> = tickers.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let mut hasher = blake3::Hasher::new();
    hasher.update(sorted.join(",").as_bytes());
    hasher.update(b"|");
    hasher.update(start.to_string().as_bytes());
    hasher.finalize().to_hex().as_str()[..16].to_string()
}

#[derive(Debug, Clone)]
pub struct PriceCache {
    cache_dir: PathBuf,
}

impl PriceCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn table_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("prices_{key}.parquet"))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("prices_{key}.meta.json"))
    }

    /// Store a table under the key for `(tickers, start)`.
    pub fn store(
        &self,
        tickers: &[String],
        start: NaiveDate,
        table: &PriceTable,
        source: &str,
    ) -> Result<CacheMeta, DataError> {
        if table.is_empty() {
            return Err(DataError::CacheError("refusing to cache an empty table".into()));
        }

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let key = cache_key(tickers, start);
        let path = self.table_path(&key);
        let tmp_path = path.with_extension("parquet.tmp");

        let mut df = table_to_dataframe(table)?;
        write_parquet(&mut df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let mut requested: Vec<String> = tickers.to_vec();
        requested.sort_unstable();
        requested.dedup();

        let meta = CacheMeta {
            key: key.clone(),
            tickers: requested,
            start,
            columns: table.tickers().to_vec(),
            first_date: table.first_date(),
            last_date: table.last_date(),
            rows: table.len(),
            dataset_hash: table.dataset_hash(),
            source: source.to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(&key), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        debug!(key = %key, rows = table.len(), source, "cached price table");
        Ok(meta)
    }

    /// Load the table cached for `(tickers, start)`.
    pub fn load(&self, tickers: &[String], start: NaiveDate) -> Result<PriceTable, DataError> {
        let key = cache_key(tickers, start);
        let path = self.table_path(&key);
        if !path.exists() {
            return Err(DataError::CacheMiss { start });
        }

        match read_parquet(&path).and_then(|df| dataframe_to_table(&df)) {
            Ok(table) if !table.is_empty() => Ok(table),
            Ok(_) => Err(DataError::CacheMiss { start }),
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                let _ = fs::rename(&path, &quarantine);
                let _ = fs::remove_file(self.meta_path(&key));
                Err(DataError::CacheMiss { start })
            }
        }
    }

    pub fn get_meta(&self, tickers: &[String], start: NaiveDate) -> Option<CacheMeta> {
        read_meta(&self.meta_path(&cache_key(tickers, start)))
    }

    /// Every readable metadata sidecar in the cache, oldest first.
    pub fn entries(&self) -> Result<Vec<CacheMeta>, DataError> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let dir = fs::read_dir(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        let mut metas = Vec::new();
        for entry in dir {
            let path = entry
                .map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?
                .path();
            let is_meta = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("prices_") && n.ends_with(".meta.json"));
            if is_meta {
                if let Some(meta) = read_meta(&path) {
                    metas.push(meta);
                }
            }
        }
        metas.sort_by_key(|m| m.cached_at);
        Ok(metas)
    }
}

fn read_meta(path: &Path) -> Option<CacheMeta> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Price source backed by [`PriceCache`]; first link of the default chain.
pub struct CacheSource {
    cache: Arc<PriceCache>,
}

impl CacheSource {
    pub fn new(cache: Arc<PriceCache>) -> Self {
        Self { cache }
    }
}

impl PriceSource for CacheSource {
    fn name(&self) -> &str {
        "cache"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Cache
    }

    fn fetch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, DataError> {
        let table = self.cache.load(tickers, start)?.between(start, end);
        if table.is_empty() {
            return Err(DataError::CacheMiss { start });
        }
        Ok(table)
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn table_to_dataframe(table: &PriceTable) -> Result<DataFrame, DataError> {
    let epoch = NaiveDate::default();
    let days: Vec<i32> = table
        .dates()
        .iter()
        .map(|d| (*d - epoch).num_days() as i32)
        .collect();

    let mut columns = Vec::with_capacity(table.tickers().len() + 1);
    columns.push(
        Column::new("date".into(), days)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
    );
    for ticker in table.tickers() {
        let prices = table.column(ticker).unwrap_or_default().to_vec();
        columns.push(Column::new(ticker.as_str().into(), prices));
    }

    DataFrame::new(columns).map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<DataFrame, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))
}

fn dataframe_to_table(df: &DataFrame) -> Result<PriceTable, DataError> {
    let date_col = df
        .column("date")
        .map_err(|e| DataError::ParquetError(format!("missing date column: {e}")))?;
    let date_ca = date_col
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;

    let epoch = NaiveDate::default();
    let mut dates = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        dates.push(epoch + chrono::Duration::days(days as i64));
    }

    let mut columns = Vec::new();
    for col in df.get_columns() {
        if col.name().as_str() == "date" {
            continue;
        }
        let ca = col
            .f64()
            .map_err(|e| DataError::ParquetError(format!("column '{}' type: {e}", col.name())))?;
        let prices: Vec<f64> = ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        columns.push((col.name().to_string(), prices));
    }

    Ok(PriceTable::new(dates, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap() + chrono::Duration::days(n)
    }

    fn sample() -> PriceTable {
        PriceTable::new(
            (0..3).map(day).collect(),
            vec![
                ("SPY".into(), vec![470.0, 472.5, 471.0]),
                ("QQQ".into(), vec![400.0, 401.0, 405.25]),
            ],
        )
        .unwrap()
    }

    fn tickers() -> Vec<String> {
        vec!["SPY".into(), "QQQ".into()]
    }

    #[test]
    fn key_ignores_ticker_order() {
        let a = cache_key(&["A".into(), "B".into()], day(0));
        let b = cache_key(&["B".into(), "A".into(), "A".into()], day(0));
        assert_eq!(a, b);
        assert_ne!(a, cache_key(&["A".into(), "B".into()], day(1)));
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn store_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PriceCache::new(dir.path());
        let table = sample();

        let meta = cache.store(&tickers(), day(0), &table, "yahoo_finance").unwrap();
        assert_eq!(meta.rows, 3);
        assert_eq!(meta.tickers, vec!["QQQ".to_string(), "SPY".to_string()]);

        let loaded = cache.load(&tickers(), day(0)).unwrap();
        assert_eq!(loaded, table);
        assert_eq!(loaded.dataset_hash(), meta.dataset_hash);
    }

    #[test]
    fn miss_for_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PriceCache::new(dir.path());
        assert!(matches!(
            cache.load(&tickers(), day(0)),
            Err(DataError::CacheMiss { .. })
        ));
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PriceCache::new(dir.path());
        let key = cache_key(&tickers(), day(0));
        fs::write(cache.table_path(&key), b"not parquet").unwrap();

        assert!(cache.load(&tickers(), day(0)).is_err());
        assert!(!cache.table_path(&key).exists());
        assert!(dir
            .path()
            .join(format!("prices_{key}.parquet.quarantined"))
            .exists());
    }

    #[test]
    fn entries_lists_stored_tables() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PriceCache::new(dir.path());
        assert!(cache.entries().unwrap().is_empty());

        cache.store(&tickers(), day(0), &sample(), "synthetic").unwrap();
        cache
            .store(&["SPY".into()], day(0), &sample().select(&["SPY".into()]), "synthetic")
            .unwrap();
        assert_eq!(cache.entries().unwrap().len(), 2);
    }

    #[test]
    fn cache_source_trims_to_range() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(PriceCache::new(dir.path()));
        cache.store(&tickers(), day(0), &sample(), "synthetic").unwrap();

        let source = CacheSource::new(cache);
        let table = source.fetch(&tickers(), day(0), day(1)).unwrap();
        assert_eq!(table.len(), 2);
    }
}
