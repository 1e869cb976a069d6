//! Immutable parameters for one simulation run.

use crate::domain::PriceTable;
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;

/// Fatal input-contract violations. A run that hits one returns no results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("lookback must be at least 2 (got {0})")]
    LookbackTooShort(usize),

    #[error("holding period must be at least 1 (got {0})")]
    HoldingTooShort(usize),

    #[error("initial capital must be positive and finite (got {0})")]
    InvalidCapital(f64),

    #[error("ticker universe is empty")]
    EmptyUniverse,

    #[error("ticker '{0}' is not present in the price table")]
    MissingTicker(String),

    #[error("no usable price for '{ticker}' at row {index} ({date:?})")]
    MissingPrice {
        ticker: String,
        index: usize,
        date: Option<NaiveDate>,
    },

    #[error("row {0} is outside the price table")]
    RowOutOfRange(usize),
}

/// Parameters for a single walk-forward run.
///
/// The price table sits behind an `Arc` so a grid search can share one
/// table across many configs without copying it.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    /// Trailing window length used for scoring.
    pub lookback: usize,
    /// Rows between entry and exit; also the rebalance step.
    pub holding: usize,
    pub initial_capital: f64,
    /// Tickers to score, in tie-break order.
    pub universe: Vec<String>,
    pub prices: Arc<PriceTable>,
}

impl BacktestConfig {
    pub fn new(
        lookback: usize,
        holding: usize,
        initial_capital: f64,
        universe: Vec<String>,
        prices: Arc<PriceTable>,
    ) -> Self {
        Self {
            lookback,
            holding,
            initial_capital,
            universe,
            prices,
        }
    }

    /// Check the input contract before any period runs.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.lookback < 2 {
            return Err(SimulationError::LookbackTooShort(self.lookback));
        }
        if self.holding < 1 {
            return Err(SimulationError::HoldingTooShort(self.holding));
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(SimulationError::InvalidCapital(self.initial_capital));
        }
        if self.universe.is_empty() {
            return Err(SimulationError::EmptyUniverse);
        }
        if let Some(missing) = self.universe.iter().find(|t| !self.prices.contains(t)) {
            return Err(SimulationError::MissingTicker(missing.clone()));
        }
        Ok(())
    }

    /// Decision rows: `lookback, lookback + holding, ...` while an exit row
    /// `i + holding` still exists in the table.
    pub fn period_indices(&self) -> impl Iterator<Item = usize> {
        let total = self.prices.len();
        let holding = self.holding.max(1);
        (self.lookback..)
            .step_by(holding)
            .take_while(move |i| i.checked_add(holding).is_some_and(|exit| exit < total))
    }

    pub fn period_count(&self) -> usize {
        self.period_indices().count()
    }
}
