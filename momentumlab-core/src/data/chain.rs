//! Ordered fallback chain of price sources.
//!
//! Sources are tried in order until one returns a table. The winning source
//! is reported with the table. When a cache is attached, tables from network
//! sources are written back so the next run hits the cache.

use super::cache::PriceCache;
use super::provider::{DataError, PriceSource, SourceKind};
use crate::domain::PriceTable;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

/// A price table plus the source that produced it.
#[derive(Debug, Clone)]
pub struct ChainFetch {
    pub table: PriceTable,
    pub source_name: String,
    pub source_kind: SourceKind,
}

#[derive(Default)]
pub struct SourceChain {
    sources: Vec<Box<dyn PriceSource>>,
    write_back: Option<Arc<PriceCache>>,
}

impl SourceChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source; sources are tried in insertion order.
    pub fn with_source(mut self, source: impl PriceSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn push(&mut self, source: Box<dyn PriceSource>) {
        self.sources.push(source);
    }

    /// Write successful network fetches back to `cache`.
    pub fn with_write_back(mut self, cache: Arc<PriceCache>) -> Self {
        self.write_back = Some(cache);
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Try each source in order; fail only when every source failed.
    pub fn fetch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ChainFetch, DataError> {
        let mut failures = Vec::new();

        for source in &self.sources {
            let name = source.name();
            if !source.is_available() {
                info!(source = name, "price source unavailable, skipping");
                failures.push((name.to_string(), "unavailable".to_string()));
                continue;
            }

            match source.fetch(tickers, start, end) {
                Ok(table) if !table.is_empty() => {
                    info!(
                        source = name,
                        tickers = table.tickers().len(),
                        rows = table.len(),
                        "price table loaded"
                    );
                    self.write_back(source.kind(), name, tickers, start, &table);
                    return Ok(ChainFetch {
                        table,
                        source_name: name.to_string(),
                        source_kind: source.kind(),
                    });
                }
                Ok(_) => {
                    warn!(source = name, "price source returned an empty table, falling back");
                    failures.push((name.to_string(), "empty table".to_string()));
                }
                Err(e) => {
                    warn!(source = name, error = %e, "price source failed, falling back");
                    failures.push((name.to_string(), e.to_string()));
                }
            }
        }

        Err(DataError::AllSourcesFailed { failures })
    }

    fn write_back(
        &self,
        kind: SourceKind,
        name: &str,
        tickers: &[String],
        start: NaiveDate,
        table: &PriceTable,
    ) {
        let Some(cache) = self.write_back.as_ref().filter(|_| kind.is_remote()) else {
            return;
        };
        // A failed cache write never fails the fetch.
        if let Err(e) = cache.store(tickers, start, table, name) {
            warn!(source = name, error = %e, "could not cache price table");
        }
    }
}
