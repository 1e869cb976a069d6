//! Multi-ticker close alignment.
//!
//! Per-ticker close series are merged onto the union of their dates and each
//! column is forward-filled. [`align_ragged`] keeps every ticker's full
//! history, leaving `NaN` above a ticker's first close; [`align_closes`] also
//! drops those leading rows so the table has no `NaN` cells.

use super::provider::{DailyClose, DataError};
use crate::domain::PriceTable;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

/// Align per-ticker closes and drop leading rows where any ticker has no price.
pub fn align_closes(
    tickers: &[String],
    series: &BTreeMap<String, Vec<DailyClose>>,
) -> Result<PriceTable, DataError> {
    Ok(align_ragged(tickers, series)?.trim_leading_gaps())
}

/// Align per-ticker closes into a forward-filled [`PriceTable`] covering the
/// union of all dates.
///
/// Columns follow the order of `tickers`. Tickers with no series (or only
/// non-finite closes) are dropped with a warning.
pub fn align_ragged(
    tickers: &[String],
    series: &BTreeMap<String, Vec<DailyClose>>,
) -> Result<PriceTable, DataError> {
    let mut kept: Vec<&String> = Vec::new();
    for ticker in tickers {
        let has_data = series
            .get(ticker)
            .is_some_and(|s| s.iter().any(|c| c.close.is_finite()));
        if has_data {
            if !kept.contains(&ticker) {
                kept.push(ticker);
            }
        } else {
            warn!(%ticker, "no price data, dropping ticker");
        }
    }

    let dates: Vec<NaiveDate> = kept
        .iter()
        .flat_map(|t| series[*t].iter().map(|c| c.date))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let columns: Vec<(String, Vec<f64>)> = kept
        .iter()
        .map(|ticker| {
            let by_date: HashMap<NaiveDate, f64> =
                series[*ticker].iter().map(|c| (c.date, c.close)).collect();
            let raw = dates
                .iter()
                .map(|d| by_date.get(d).copied().unwrap_or(f64::NAN))
                .collect::<Vec<_>>();
            ((*ticker).clone(), forward_fill(&raw))
        })
        .collect();

    Ok(PriceTable::new(dates, columns)?)
}

/// Replace each non-finite value with the last finite value before it.
/// Leading gaps stay `NaN`.
pub fn forward_fill(values: &[f64]) -> Vec<f64> {
    let mut last = f64::NAN;
    values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                last = v;
            }
            last
        })
        .collect()
}
