//! Price source trait and structured error types.
//!
//! The PriceSource trait abstracts over where closing prices come from (local
//! Parquet cache, FinancialDatasets.ai, Yahoo Finance, a synthetic walk) so the
//! source chain can try them in order and tests can mock them.

use crate::domain::{PriceTable, PriceTableError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use super::align::align_ragged;

/// One daily close for one ticker, as returned by a network source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("source '{0}' is not configured")]
    Unavailable(String),

    #[error("no cached prices for this ticker set since {start}")]
    CacheMiss { start: NaiveDate },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no price data returned for any of {0} tickers")]
    NoData(usize),

    #[error("invalid price table: {0}")]
    Table(#[from] PriceTableError),

    #[error("all price sources failed: {}", format_failures(.failures))]
    AllSourcesFailed { failures: Vec<(String, String)> },

    #[error("data error: {0}")]
    Other(String),
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(source, err)| format!("{source}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Where a price table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Cache,
    FinancialDatasets,
    Yahoo,
    Synthetic,
}

impl SourceKind {
    /// Network sources are worth writing back to the cache.
    pub fn is_remote(self) -> bool {
        matches!(self, SourceKind::FinancialDatasets | SourceKind::Yahoo)
    }
}

/// A named provider of aligned close-price tables.
///
/// Implementations return a forward-filled table over the union of the
/// tickers' dates; a ticker listed later than the others has `NaN` above its
/// first close. Callers that need a gap-free table use
/// [`PriceTable::trim_leading_gaps`]. Tickers the source knows nothing about
/// are left out of the table rather than failing the call.
pub trait PriceSource: Send + Sync {
    /// Human-readable name, reported as the table's provenance.
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Fetch closes for `tickers` on `[start, end]`.
    fn fetch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, DataError>;

    /// Whether the source can be tried right now (credentials present, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}

/// Request pacing for sources that fetch one ticker per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Pacing {
    /// Tickers fetched back to back before pausing.
    pub batch: usize,
    pub pause: Duration,
}

impl Pacing {
    #[cfg(test)]
    pub const NONE: Pacing = Pacing {
        batch: usize::MAX,
        pause: Duration::ZERO,
    };

    pub const fn every(batch: usize, pause: Duration) -> Self {
        Self { batch, pause }
    }

    /// Whether to pause before fetching the ticker at position `i`.
    pub fn pause_before(&self, i: usize) -> bool {
        i > 0 && !self.pause.is_zero() && i % self.batch.max(1) == 0
    }
}

/// Fetch tickers one at a time through `fetch_one` and align the results.
///
/// Per-ticker failures are logged and the ticker dropped; the call only fails
/// when no ticker produced any data.
pub(crate) fn fetch_each<F>(
    source: &str,
    tickers: &[String],
    pacing: Pacing,
    mut fetch_one: F,
) -> Result<PriceTable, DataError>
where
    F: FnMut(&str) -> Result<Vec<DailyClose>, DataError>,
{
    let mut series = BTreeMap::new();
    for (i, ticker) in tickers.iter().enumerate() {
        if pacing.pause_before(i) {
            std::thread::sleep(pacing.pause);
        }
        match fetch_one(ticker) {
            Ok(closes) if !closes.is_empty() => {
                series.insert(ticker.clone(), closes);
            }
            Ok(_) => warn!(source, %ticker, "no prices returned"),
            Err(DataError::CircuitBreakerTripped) => return Err(DataError::CircuitBreakerTripped),
            Err(e) => warn!(source, %ticker, error = %e, "ticker fetch failed"),
        }
    }
    if series.is_empty() {
        return Err(DataError::NoData(tickers.len()));
    }
    align_ragged(tickers, &series)
}
