//! Backtest runner: wires loaded prices, the walk-forward engine, and the analyzer.
//!
//! Two entry points:
//! - `run_backtest()`: takes pre-loaded prices and one (lookback, holding) pair.
//!   Used by the sweep and by tests.
//! - `run_single_backtest()`: resolves the universe and loads prices from an
//!   `ExperimentConfig` first. Used by the CLI.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use momentumlab_core::engine::{run, BacktestConfig, PeriodRecord, SimulationError};
use momentumlab_core::{analyze_with, DrawdownMethod, PerformanceSummary, Trade};

use crate::config::{ConfigError, ExperimentConfig};
use crate::data_loader::{load_prices, resolve_universe, LoadError, LoadOptions, LoadedPrices};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Parameters of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub lookback: usize,
    pub holding: usize,
    pub initial_capital: f64,
    #[serde(default)]
    pub drawdown: DrawdownMethod,
}

impl RunSpec {
    /// `Win_{lookback}_Hold_{holding}`.
    pub fn name(&self) -> String {
        format!("Win_{}_Hold_{}", self.lookback, self.holding)
    }
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// BLAKE3 of the run parameters and the dataset hash.
    pub run_id: String,
    pub name: String,
    pub spec: RunSpec,
    pub summary: PerformanceSummary,
    pub final_value: f64,
    pub trade_count: usize,
    pub win_rate: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
    pub periods: Vec<PeriodRecord>,
    pub universe: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub source: String,
    pub dataset_hash: String,
    pub is_synthetic: bool,
}

/// Default schema version for older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn roi(&self) -> f64 {
        self.summary.roi
    }
}

/// Deterministic id: the same parameters on the same data give the same id.
pub fn run_id(spec: &RunSpec, dataset_hash: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(spec.lookback as u64).to_le_bytes());
    hasher.update(&(spec.holding as u64).to_le_bytes());
    hasher.update(&spec.initial_capital.to_le_bytes());
    hasher.update(format!("{:?}", spec.drawdown).as_bytes());
    hasher.update(dataset_hash.as_bytes());
    hasher.finalize().to_hex().as_str()[..16].to_string()
}

/// Run one (lookback, holding) simulation on pre-loaded prices.
pub fn run_backtest(loaded: &LoadedPrices, spec: RunSpec) -> Result<BacktestResult, RunError> {
    let config = BacktestConfig::new(
        spec.lookback,
        spec.holding,
        spec.initial_capital,
        loaded.universe.clone(),
        loaded.prices.clone(),
    );
    let sim = run(&config)?;
    let summary = analyze_with(&sim.equity_curve, spec.holding, spec.drawdown);
    let trade_count = sim.trade_count();
    let win_rate = sim.win_rate();

    info!(
        run = %spec.name(),
        roi = summary.roi,
        max_drawdown = summary.max_drawdown,
        sharpe = summary.sharpe,
        trades = trade_count,
        "backtest finished"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: run_id(&spec, &loaded.dataset_hash),
        name: spec.name(),
        spec,
        summary,
        final_value: sim.final_cash,
        trade_count,
        win_rate,
        trades: sim.trades,
        equity_curve: sim.equity_curve,
        periods: sim.periods,
        universe: loaded.universe.clone(),
        start_date: loaded.prices.first_date(),
        end_date: loaded.prices.last_date(),
        source: loaded.source_name.clone(),
        dataset_hash: loaded.dataset_hash.clone(),
        is_synthetic: loaded.is_synthetic(),
    })
}

/// Resolve the universe and load prices for an experiment.
pub fn load_for_experiment(config: &ExperimentConfig) -> Result<LoadedPrices, RunError> {
    config.validate()?;
    let universe = resolve_universe(&config.data)?;
    info!(source = %universe.source, tickers = universe.tickers.len(), "universe resolved");
    let opts = LoadOptions::from_section(&config.data, config.end_date());
    Ok(load_prices(&universe.tickers, &opts)?)
}

/// Load data per `config` and run a single (lookback, holding) pair.
pub fn run_single_backtest(
    config: &ExperimentConfig,
    lookback: usize,
    holding: usize,
) -> Result<BacktestResult, RunError> {
    let loaded = load_for_experiment(config)?;
    run_backtest(
        &loaded,
        RunSpec {
            lookback,
            holding,
            initial_capital: config.backtest.initial_capital,
            drawdown: config.backtest.drawdown,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use momentumlab_core::data::SourceKind;
    use momentumlab_core::PriceTable;

    fn linear_prices() -> LoadedPrices {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..22).map(|i| start + chrono::Duration::days(i)).collect();
        let prices = (0..22).map(|i| 100.0 + i as f64).collect();
        let table = PriceTable::new(dates, vec![("AAA".into(), prices)]).unwrap();
        LoadedPrices::from_table(table, "test", SourceKind::Cache)
    }

    fn spec(lookback: usize, holding: usize) -> RunSpec {
        RunSpec {
            lookback,
            holding,
            initial_capital: 10_000.0,
            drawdown: DrawdownMethod::PeakToFinal,
        }
    }

    #[test]
    fn single_trade_on_linear_series() {
        let result = run_backtest(&linear_prices(), spec(20, 1)).unwrap();
        assert_eq!(result.name, "Win_20_Hold_1");
        assert_eq!(result.trade_count, 1);
        assert_eq!(result.trades[0].position.entry_index, 20);
        assert_eq!(result.trades[0].position.exit_index, 21);
        let expected = 10_000.0 * (1.0 + 1.0 / 120.0);
        assert!((result.final_value - expected).abs() < 1e-9);
        assert!((result.roi() - 1.0 / 120.0).abs() < 1e-12);
        assert_eq!(result.equity_curve.len(), 2);
        assert!(!result.is_synthetic);
    }

    #[test]
    fn run_id_is_deterministic_and_parameter_sensitive() {
        let a = run_id(&spec(20, 10), "abc");
        assert_eq!(a, run_id(&spec(20, 10), "abc"));
        assert_eq!(a.len(), 16);
        assert_ne!(a, run_id(&spec(20, 5), "abc"));
        assert_ne!(a, run_id(&spec(20, 10), "abd"));
    }

    #[test]
    fn invalid_parameters_are_fatal() {
        let err = run_backtest(&linear_prices(), spec(1, 1)).unwrap_err();
        assert!(matches!(
            err,
            RunError::Simulation(SimulationError::LookbackTooShort(1))
        ));
    }

    #[test]
    fn result_json_without_schema_version_defaults() {
        let result = run_backtest(&linear_prices(), spec(20, 1)).unwrap();
        let mut value = serde_json::to_value(&result).unwrap();
        value.as_object_mut().unwrap().remove("schema_version");
        let back: BacktestResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
        assert_eq!(back, result);
    }
}
