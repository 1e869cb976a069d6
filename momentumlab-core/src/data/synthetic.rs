//! Deterministic synthetic price source for offline runs and tests.
//!
//! Each ticker gets a geometric random walk over weekdays, seeded from the
//! source seed and the ticker name, so the same request always yields the
//! same table.

use super::provider::{DataError, PriceSource, SourceKind};
use crate::domain::PriceTable;
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    seed: u64,
    start_price: f64,
    /// Mean daily log return.
    drift: f64,
    /// Half-width of the uniform daily log-return shock.
    volatility: f64,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(42)
    }
}

impl SyntheticSource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start_price: 100.0,
            drift: 0.0004,
            volatility: 0.03,
        }
    }

    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    fn ticker_seed(&self, ticker: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(ticker.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    fn walk(&self, ticker: &str, steps: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(self.ticker_seed(ticker));
        let mut price = self.start_price;
        (0..steps)
            .map(|step| {
                if step > 0 {
                    let shock = rng.gen_range(-self.volatility..=self.volatility);
                    price *= (self.drift + shock).exp();
                }
                price
            })
            .collect()
    }
}

/// Weekdays in `[start, end]`.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

impl PriceSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    fn fetch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, DataError> {
        let dates = business_days(start, end);
        if dates.is_empty() || tickers.is_empty() {
            return Err(DataError::NoData(tickers.len()));
        }
        let mut columns: Vec<(String, Vec<f64>)> = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            if columns.iter().any(|(t, _)| t == ticker) {
                continue;
            }
            columns.push((ticker.clone(), self.walk(ticker, dates.len())));
        }
        Ok(PriceTable::new(dates, columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn skips_weekends() {
        // 2024-01-05 is a Friday.
        let days = business_days(day(2024, 1, 5), day(2024, 1, 8));
        assert_eq!(days, vec![day(2024, 1, 5), day(2024, 1, 8)]);
    }

    #[test]
    fn same_request_same_table() {
        let source = SyntheticSource::new(7);
        let tickers = vec!["AAA".to_string(), "BBB".to_string()];
        let a = source.fetch(&tickers, day(2024, 1, 1), day(2024, 3, 1)).unwrap();
        let b = source.fetch(&tickers, day(2024, 1, 1), day(2024, 3, 1)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.column("AAA"), a.column("BBB"));
    }

    #[test]
    fn ticker_series_independent_of_universe() {
        let source = SyntheticSource::new(7);
        let alone = source
            .fetch(&["AAA".into()], day(2024, 1, 1), day(2024, 2, 1))
            .unwrap();
        let both = source
            .fetch(&["BBB".into(), "AAA".into()], day(2024, 1, 1), day(2024, 2, 1))
            .unwrap();
        assert_eq!(alone.column("AAA"), both.column("AAA"));
    }

    #[test]
    fn prices_stay_positive() {
        let source = SyntheticSource::new(1).with_volatility(0.2).with_drift(-0.01);
        let table = source
            .fetch(&["X".into()], day(2020, 1, 1), day(2023, 12, 31))
            .unwrap();
        assert!(table.column("X").unwrap().iter().all(|p| *p > 0.0));
    }

    #[test]
    fn empty_range_is_no_data() {
        let source = SyntheticSource::default();
        // A single Saturday.
        let err = source
            .fetch(&["X".into()], day(2024, 1, 6), day(2024, 1, 6))
            .unwrap_err();
        assert!(matches!(err, DataError::NoData(1)));
    }
}
