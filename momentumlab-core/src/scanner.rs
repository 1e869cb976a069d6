//! Live scanner: rank tickers by trend quality over the most recent window.
//!
//! Unlike the walk-forward loop, the window here ends at the last row of the
//! table, since there is no future to protect.

use crate::domain::PriceTable;
use crate::scoring::{score_window, Scored};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub lookback: usize,
    /// Keep only picks whose R² is strictly above this.
    pub min_r_squared: f64,
    pub top: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            min_r_squared: 0.8,
            top: 10,
        }
    }
}

/// One ranked candidate. Field names match the `todays_picks.csv` columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "Score")]
    pub score: f64,
    #[serde(rename = "R2")]
    pub r_squared: f64,
    #[serde(rename = "Momentum_Slope")]
    pub slope: f64,
    #[serde(rename = "Current_Price")]
    pub current_price: f64,
}

/// Score the trailing `lookback` rows of every ticker and return the best
/// `top` positive, smooth trends, highest score first.
///
/// Each ticker is scored on its own trailing prices, so `prices` may hold
/// columns of different ages with `NaN` above a ticker's first close.
/// Tickers with fewer than `lookback` prices or an unscorable window are
/// skipped.
pub fn scan(prices: &PriceTable, tickers: &[String], config: &ScanConfig) -> Vec<Pick> {
    let end = prices.len();
    let mut picks: Vec<Pick> = tickers
        .iter()
        .filter_map(|ticker| {
            let window = prices.window(ticker, end, config.lookback)?;
            let score = match score_window(window) {
                Scored::Valid(score) => score,
                Scored::Unscorable(reason) => {
                    debug!(%ticker, ?reason, "scan: ticker unscorable");
                    return None;
                }
            };
            let current_price = *window.last()?;
            (score.is_actionable() && score.r_squared > config.min_r_squared).then(|| Pick {
                ticker: ticker.clone(),
                score: score.score,
                r_squared: score.r_squared,
                slope: score.slope,
                current_price: round2(current_price),
            })
        })
        .collect();

    picks.sort_by(|a, b| b.score.total_cmp(&a.score));
    picks.truncate(config.top);
    picks
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
