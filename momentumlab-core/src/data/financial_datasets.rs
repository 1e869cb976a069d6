//! FinancialDatasets.ai price source.
//!
//! `GET https://api.financialdatasets.ai/prices/` with an `X-API-KEY` header,
//! one request per ticker. Daily bars, at most 1000 per request. A 429 is
//! retried once after two seconds; tickers are spaced 100 ms apart.

use super::provider::{fetch_each, DailyClose, DataError, Pacing, PriceSource, SourceKind};
use crate::domain::PriceTable;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const API_KEY_ENV: &str = "FD_API_KEY";
const BASE_URL: &str = "https://api.financialdatasets.ai/prices/";
const RATE_LIMIT_WAIT: Duration = Duration::from_secs(2);
const PACING: Pacing = Pacing::every(1, Duration::from_millis(100));

#[derive(Debug, Deserialize)]
struct PricesResponse {
    #[serde(default)]
    prices: Vec<PriceBar>,
}

#[derive(Debug, Deserialize)]
struct PriceBar {
    time: String,
    close: Option<f64>,
}

pub struct FinancialDatasetsSource {
    client: reqwest::blocking::Client,
    api_key: Option<String>,
}

impl FinancialDatasetsSource {
    pub fn new(api_key: Option<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Read the key from `FD_API_KEY`; the source is unavailable without it.
    pub fn from_env() -> Result<Self, DataError> {
        Self::new(std::env::var(API_KEY_ENV).ok())
    }

    fn fetch_ticker(
        &self,
        api_key: &str,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, DataError> {
        let start = start.to_string();
        let end = end.to_string();
        let query = [
            ("ticker", ticker),
            ("interval", "day"),
            ("interval_multiplier", "1"),
            ("start_date", start.as_str()),
            ("end_date", end.as_str()),
            ("limit", "1000"),
        ];

        let send = || {
            self.client
                .get(BASE_URL)
                .header("X-API-KEY", api_key)
                .query(&query)
                .send()
                .map_err(|e| DataError::NetworkUnreachable(e.to_string()))
        };

        let mut resp = send()?;
        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(ticker, "financialdatasets rate limit, retrying once");
            std::thread::sleep(RATE_LIMIT_WAIT);
            resp = send()?;
        }

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                retry_after_secs: RATE_LIMIT_WAIT.as_secs(),
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DataError::AuthenticationRequired(format!(
                "financialdatasets rejected the API key (HTTP {status})"
            )));
        }
        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} for {ticker}")));
        }

        let body: PricesResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse prices for {ticker}: {e}"))
        })?;
        let closes = parse_prices(body)?;
        debug!(ticker, bars = closes.len(), "financialdatasets prices");
        Ok(closes)
    }
}

fn parse_prices(body: PricesResponse) -> Result<Vec<DailyClose>, DataError> {
    let mut closes = body
        .prices
        .into_iter()
        .filter_map(|bar| bar.close.map(|close| (bar.time, close)))
        .map(|(time, close)| {
            Ok(DailyClose {
                date: parse_time(&time)?,
                close,
            })
        })
        .collect::<Result<Vec<_>, DataError>>()?;
    closes.sort_by_key(|c| c.date);
    closes.dedup_by_key(|c| c.date);
    Ok(closes)
}

/// `time` is either a bare date or an RFC 3339 timestamp; only the date matters.
fn parse_time(time: &str) -> Result<NaiveDate, DataError> {
    let date_part = time.get(..10).unwrap_or(time);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| DataError::ResponseFormatChanged(format!("bad time '{time}': {e}")))
}

impl PriceSource for FinancialDatasetsSource {
    fn name(&self) -> &str {
        "financial_datasets"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::FinancialDatasets
    }

    fn fetch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, DataError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DataError::Unavailable(self.name().to_string()))?;
        fetch_each(self.name(), tickers, PACING, |ticker| {
            self.fetch_ticker(api_key, ticker, start, end)
        })
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dates_and_timestamps() {
        let body: PricesResponse = serde_json::from_str(
            r#"{"prices":[
                {"time":"2024-01-03T05:00:00Z","close":101.5,"open":100.0},
                {"time":"2024-01-02","close":100.25},
                {"time":"2024-01-04","close":null}
            ]}"#,
        )
        .unwrap();
        let closes = parse_prices(body).unwrap();
        assert_eq!(closes.len(), 2);
        assert_eq!(closes[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(closes[1].close, 101.5);
    }

    #[test]
    fn missing_prices_key_is_empty() {
        let body: PricesResponse = serde_json::from_str("{}").unwrap();
        assert!(parse_prices(body).unwrap().is_empty());
    }

    #[test]
    fn unavailable_without_key() {
        let source = FinancialDatasetsSource::new(Some("  ".into())).unwrap();
        assert!(!source.is_available());
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let err = source.fetch(&["AAPL".into()], day, day).unwrap_err();
        assert!(matches!(err, DataError::Unavailable(_)));
    }
}
