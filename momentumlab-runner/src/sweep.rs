//! Parameter sweep over (lookback, holding) pairs.
//!
//! Every grid cell is an independent simulation over the same shared
//! `Arc<PriceTable>`, so cells run in parallel on the rayon pool. Results are
//! sorted afterwards, which keeps the output independent of scheduling.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

use momentumlab_core::DrawdownMethod;

use crate::config::{ConfigError, ExperimentConfig};
use crate::data_loader::LoadedPrices;
use crate::runner::{load_for_experiment, run_backtest, BacktestResult, RunError, RunSpec};

/// Lookback windows × holding periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub lookbacks: Vec<usize>,
    pub holdings: Vec<usize>,
}

impl Default for ParamGrid {
    /// Lookbacks 10, 20, 30 × holdings 5, 10, 15.
    fn default() -> Self {
        Self {
            lookbacks: vec![10, 20, 30],
            holdings: vec![5, 10, 15],
        }
    }
}

impl ParamGrid {
    pub fn new(lookbacks: Vec<usize>, holdings: Vec<usize>) -> Self {
        Self { lookbacks, holdings }
    }

    /// Total number of grid cells.
    pub fn size(&self) -> usize {
        self.lookbacks.len() * self.holdings.len()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookbacks.is_empty() || self.holdings.is_empty() {
            return Err(ConfigError::EmptyGrid);
        }
        if let Some(&lb) = self.lookbacks.iter().find(|&&lb| lb < 2) {
            return Err(ConfigError::LookbackTooShort(lb));
        }
        if let Some(&hp) = self.holdings.iter().find(|&&hp| hp < 1) {
            return Err(ConfigError::HoldingTooShort(hp));
        }
        Ok(())
    }

    /// One spec per cell, lookback-major.
    pub fn specs(&self, initial_capital: f64, drawdown: DrawdownMethod) -> Vec<RunSpec> {
        self.lookbacks
            .iter()
            .flat_map(|&lookback| {
                self.holdings.iter().map(move |&holding| RunSpec {
                    lookback,
                    holding,
                    initial_capital,
                    drawdown,
                })
            })
            .collect()
    }
}

/// Sweep output, best ROI first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResults {
    pub results: Vec<BacktestResult>,
}

/// One line of the sweep summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub name: String,
    pub lookback: usize,
    pub holding: usize,
    pub roi: f64,
    pub final_value: f64,
    pub max_drawdown: f64,
    pub sharpe: f64,
    pub num_trades: usize,
}

impl SweepResults {
    pub fn best(&self) -> Option<&BacktestResult> {
        self.results.first()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn rows(&self) -> Vec<SweepRow> {
        self.results
            .iter()
            .map(|r| SweepRow {
                name: r.name.clone(),
                lookback: r.spec.lookback,
                holding: r.spec.holding,
                roi: r.summary.roi,
                final_value: r.final_value,
                max_drawdown: r.summary.max_drawdown,
                sharpe: r.summary.sharpe,
                num_trades: r.trade_count,
            })
            .collect()
    }
}

/// ROI descending, then lookback and holding ascending.
fn compare_results(a: &BacktestResult, b: &BacktestResult) -> Ordering {
    b.summary
        .roi
        .total_cmp(&a.summary.roi)
        .then(a.spec.lookback.cmp(&b.spec.lookback))
        .then(a.spec.holding.cmp(&b.spec.holding))
}

/// Run every grid cell on `loaded` in parallel.
///
/// Any failing cell fails the sweep; partial grids are never returned.
pub fn run_sweep(
    loaded: &LoadedPrices,
    grid: &ParamGrid,
    initial_capital: f64,
    drawdown: DrawdownMethod,
) -> Result<SweepResults, RunError> {
    grid.validate()?;
    let specs = grid.specs(initial_capital, drawdown);
    info!(cells = specs.len(), tickers = loaded.universe.len(), "starting sweep");

    let mut results = specs
        .into_par_iter()
        .map(|spec| run_backtest(loaded, spec))
        .collect::<Result<Vec<_>, _>>()?;
    results.sort_by(compare_results);

    if let Some(best) = results.first() {
        info!(best = %best.name, roi = best.summary.roi, "sweep complete");
    }
    Ok(SweepResults { results })
}

/// Load data per `config` and sweep its grid.
pub fn run_experiment(config: &ExperimentConfig) -> Result<SweepResults, RunError> {
    let loaded = load_for_experiment(config)?;
    run_sweep(
        &loaded,
        &config.grid,
        config.backtest.initial_capital,
        config.backtest.drawdown,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_has_nine_cells() {
        let grid = ParamGrid::default();
        assert_eq!(grid.size(), 9);
        let specs = grid.specs(10_000.0, DrawdownMethod::PeakToFinal);
        assert_eq!(specs.len(), 9);
        assert_eq!((specs[0].lookback, specs[0].holding), (10, 5));
        assert_eq!((specs[8].lookback, specs[8].holding), (30, 15));
    }

    #[test]
    fn grid_validation() {
        assert!(ParamGrid::new(vec![], vec![5]).validate().is_err());
        assert!(matches!(
            ParamGrid::new(vec![10, 1], vec![5]).validate(),
            Err(ConfigError::LookbackTooShort(1))
        ));
        assert!(matches!(
            ParamGrid::new(vec![10], vec![0]).validate(),
            Err(ConfigError::HoldingTooShort(0))
        ));
        assert!(ParamGrid::default().validate().is_ok());
    }
}
