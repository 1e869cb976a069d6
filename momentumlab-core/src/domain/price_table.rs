//! PriceTable: the dated, ticker-indexed matrix of adjusted closes.
//!
//! Rows are trading dates (strictly increasing), columns are tickers in
//! insertion order. A missing cell is stored as `NaN`; the data layer
//! forward-fills before handing a table to the engine, so a well-formed table
//! has no `NaN` after its first row.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Structural errors raised while building a [`PriceTable`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriceTableError {
    #[error("dates are not strictly increasing at row {index} ({date})")]
    UnsortedDates { index: usize, date: NaiveDate },

    #[error("duplicate ticker column '{0}'")]
    DuplicateTicker(String),

    #[error("column '{ticker}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        ticker: String,
        expected: usize,
        actual: usize,
    },

    #[error("ticker '{0}' has no column")]
    MissingColumn(String),

    #[error("column '{0}' is not listed in tickers")]
    UnlistedColumn(String),
}

/// Immutable price matrix indexed by trading date and ticker.
///
/// Deserialization goes through [`PriceTable::new`], so a decoded table obeys
/// the same invariants as a constructed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PriceTableParts")]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: HashMap<String, Vec<f64>>,
}

/// Wire shape of a [`PriceTable`], checked before it becomes one.
#[derive(Deserialize)]
struct PriceTableParts {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: HashMap<String, Vec<f64>>,
}

impl TryFrom<PriceTableParts> for PriceTable {
    type Error = PriceTableError;

    fn try_from(parts: PriceTableParts) -> Result<Self, Self::Error> {
        let PriceTableParts {
            dates,
            tickers,
            mut columns,
        } = parts;
        let mut ordered = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            match columns.remove(&ticker) {
                Some(prices) => ordered.push((ticker, prices)),
                None if ordered.iter().any(|(t, _)| *t == ticker) => {
                    return Err(PriceTableError::DuplicateTicker(ticker))
                }
                None => return Err(PriceTableError::MissingColumn(ticker)),
            }
        }
        if let Some(extra) = columns.into_keys().min() {
            return Err(PriceTableError::UnlistedColumn(extra));
        }
        Self::new(dates, ordered)
    }
}

impl PriceTable {
    /// Build a table from a date axis and `(ticker, prices)` columns.
    ///
    /// Every column must have exactly one value per date.
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, PriceTableError> {
        for (index, pair) in dates.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(PriceTableError::UnsortedDates {
                    index: index + 1,
                    date: pair[1],
                });
            }
        }

        let mut tickers = Vec::with_capacity(columns.len());
        let mut by_ticker = HashMap::with_capacity(columns.len());
        for (ticker, prices) in columns {
            if prices.len() != dates.len() {
                return Err(PriceTableError::LengthMismatch {
                    ticker,
                    expected: dates.len(),
                    actual: prices.len(),
                });
            }
            if by_ticker.contains_key(&ticker) {
                return Err(PriceTableError::DuplicateTicker(ticker));
            }
            tickers.push(ticker.clone());
            by_ticker.insert(ticker, prices);
        }

        Ok(Self {
            dates,
            tickers,
            columns: by_ticker,
        })
    }

    /// Number of trading dates (rows).
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn date(&self, index: usize) -> Option<NaiveDate> {
        self.dates.get(index).copied()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Tickers in column order.
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.columns.contains_key(ticker)
    }

    /// Full price column for a ticker.
    pub fn column(&self, ticker: &str) -> Option<&[f64]> {
        self.columns.get(ticker).map(|c| c.as_slice())
    }

    /// Single cell. `None` if the ticker or row does not exist; a missing
    /// cell inside the table comes back as `Some(NaN)`.
    pub fn price(&self, ticker: &str, index: usize) -> Option<f64> {
        self.columns.get(ticker).and_then(|c| c.get(index).copied())
    }

    /// Trailing window of `len` prices ending just before row `end`.
    ///
    /// Covers rows `end - len .. end`; row `end` itself is never included.
    pub fn window(&self, ticker: &str, end: usize, len: usize) -> Option<&[f64]> {
        if len > end || end > self.dates.len() {
            return None;
        }
        self.columns.get(ticker).map(|c| &c[end - len..end])
    }

    /// Copy of the first `rows` rows.
    pub fn head(&self, rows: usize) -> Self {
        let rows = rows.min(self.dates.len());
        self.slice_rows(0, rows)
    }

    /// Copy restricted to dates in `[start, end]`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let from = self.dates.partition_point(|d| *d < start);
        let to = self.dates.partition_point(|d| *d <= end);
        self.slice_rows(from, to.max(from))
    }

    /// Copy starting at the first row where every column has a finite price.
    ///
    /// Sources keep each ticker's own history, so a recently listed ticker
    /// leaves `NaN` at the top of its column; the engine wants those rows gone.
    pub fn trim_leading_gaps(&self) -> Self {
        let first = (0..self.dates.len())
            .find(|&row| self.columns.values().all(|c| c[row].is_finite()))
            .unwrap_or(self.dates.len());
        self.slice_rows(first, self.dates.len())
    }

    /// Copy restricted to the given tickers, in the given order.
    ///
    /// Tickers absent from the table are skipped.
    pub fn select(&self, tickers: &[String]) -> Self {
        let mut kept = Vec::new();
        let mut columns = HashMap::new();
        for ticker in tickers {
            if columns.contains_key(ticker) {
                continue;
            }
            if let Some(col) = self.columns.get(ticker) {
                kept.push(ticker.clone());
                columns.insert(ticker.clone(), col.clone());
            }
        }
        Self {
            dates: self.dates.clone(),
            tickers: kept,
            columns,
        }
    }

    /// BLAKE3 digest over dates, tickers and prices, for run provenance.
    pub fn dataset_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for date in &self.dates {
            hasher.update(date.to_string().as_bytes());
        }
        for ticker in &self.tickers {
            hasher.update(ticker.as_bytes());
            for price in self.columns.get(ticker).into_iter().flatten() {
                hasher.update(&price.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    fn slice_rows(&self, from: usize, to: usize) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(t, c)| (t.clone(), c[from..to].to_vec()))
            .collect();
        Self {
            dates: self.dates[from..to].to_vec(),
            tickers: self.tickers.clone(),
            columns,
        }
    }
}
