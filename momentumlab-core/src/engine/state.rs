//! Simulation output: final cash, equity curve, trade log, period records.

use crate::domain::{Trade, TrendScore};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What the simulator decided at one rebalance point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PeriodDecision {
    /// A trade was opened and closed on `ticker`.
    Traded { ticker: String },
    /// Every ticker was unscorable this period.
    NoCandidates,
    /// The best ticker did not clear the positive-score threshold.
    NonPositiveScore { ticker: String, score: TrendScore },
}

/// Diagnostic record for one loop iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    /// Decision row in the price table.
    pub index: usize,
    pub date: NaiveDate,
    /// Tickers with a valid score this period.
    pub scored: usize,
    pub decision: PeriodDecision,
}

/// Complete result of one walk-forward run.
///
/// `equity_curve[0]` is the initial capital; each period appends exactly one
/// value, so `equity_curve.len() == periods.len() + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub final_cash: f64,
    pub equity_curve: Vec<f64>,
    pub trades: Vec<Trade>,
    pub periods: Vec<PeriodRecord>,
}

impl SimulationResult {
    /// The `(final_cash, equity_curve, trades)` triple consumed by reporting.
    pub fn into_parts(self) -> (f64, Vec<f64>, Vec<Trade>) {
        (self.final_cash, self.equity_curve, self.trades)
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    /// Fraction of trades with a positive return.
    pub fn win_rate(&self) -> f64 {
        if self.trades.is_empty() {
            return 0.0;
        }
        let winners = self.trades.iter().filter(|t| t.is_winner()).count();
        winners as f64 / self.trades.len() as f64
    }
}
