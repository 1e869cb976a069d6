//! Finviz Elite screener export.
//!
//! `GET https://elite.finviz.com/export.ashx?auth=...&f=...&o=...&c=...`
//! returns a CSV whose `Ticker` column is the universe, already ordered by
//! the screener's sort key.

use super::{normalize, UniverseError, UniverseSource};
use std::time::Duration;

pub const TOKEN_ENV: &str = "FINVIZ_API_TOKEN";
const EXPORT_URL: &str = "https://elite.finviz.com/export.ashx";

/// Screener filter, order, and column selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenerQuery {
    pub filters: String,
    pub order: String,
    pub columns: String,
}

impl Default for ScreenerQuery {
    /// Dividend-paying technology stocks, best 52-week performance first.
    fn default() -> Self {
        Self {
            filters: "fa_div_pos,sec_technology".into(),
            order: "-perf52w".into(),
            columns: "1,65".into(),
        }
    }
}

pub struct FinvizScreener {
    token: Option<String>,
    query: ScreenerQuery,
}

impl FinvizScreener {
    pub fn new(token: Option<String>, query: ScreenerQuery) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
            query,
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var(TOKEN_ENV).ok(), ScreenerQuery::default())
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn download(&self, url: &str, token: &str) -> Result<String, UniverseError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(http_error)?;
        let resp = client
            .get(url)
            .query(&[
                ("auth", token),
                ("f", self.query.filters.as_str()),
                ("o", self.query.order.as_str()),
                ("c", self.query.columns.as_str()),
            ])
            .send()
            .map_err(http_error)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(UniverseError::Http(format!("HTTP {status}")));
        }
        resp.text().map_err(http_error)
    }
}

/// The request URL carries the API token, so it never reaches the message.
fn http_error(e: reqwest::Error) -> UniverseError {
    UniverseError::Http(e.without_url().to_string())
}

impl UniverseSource for FinvizScreener {
    fn name(&self) -> &str {
        "finviz"
    }

    fn tickers(&self) -> Result<Vec<String>, UniverseError> {
        let token = self
            .token
            .as_deref()
            .ok_or(UniverseError::MissingToken(TOKEN_ENV))?;
        parse_tickers(&self.download(EXPORT_URL, token)?)
    }
}

/// Pull the `Ticker` column out of a screener CSV export.
pub fn parse_tickers(csv_text: &str) -> Result<Vec<String>, UniverseError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());
    let column = reader
        .headers()?
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}') == "Ticker")
        .ok_or(UniverseError::MissingColumn("Ticker"))?;

    let mut tickers = Vec::new();
    for record in reader.records() {
        if let Some(ticker) = record?.get(column) {
            tickers.push(ticker.to_string());
        }
    }
    Ok(normalize(tickers))
}
