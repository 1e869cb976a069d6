//! MomentumLab Runner: experiment orchestration on top of `momentumlab-core`.
//!
//! - TOML experiment config with defaults and validation
//! - Universe resolution and price loading through the source chain
//! - Single-run wrapper producing a versioned `BacktestResult`
//! - Parallel (lookback, holding) grid sweep
//! - JSONL run history and CSV/JSON/Markdown artifacts

pub mod config;
pub mod data_loader;
pub mod export;
pub mod history;
pub mod runner;
pub mod sweep;

pub use config::{ConfigError, ExperimentConfig};
pub use data_loader::{
    load_prices, load_scan_prices, resolve_universe, LoadError, LoadOptions, LoadedPrices, Rows,
};
pub use history::{HistoryEntry, RunHistory};
pub use runner::{run_backtest, run_single_backtest, BacktestResult, RunError, RunSpec, SCHEMA_VERSION};
pub use sweep::{run_experiment, run_sweep, ParamGrid, SweepResults, SweepRow};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn loaded_prices_is_send_sync() {
        assert_send::<LoadedPrices>();
        assert_sync::<LoadedPrices>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<ExperimentConfig>();
        assert_sync::<ExperimentConfig>();
        assert_send::<LoadOptions>();
        assert_sync::<LoadOptions>();
        assert_send::<ParamGrid>();
        assert_sync::<ParamGrid>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }
}
