//! MomentumLab Core: price tables, trend-quality scoring, walk-forward engine.
//!
//! This crate contains the heart of the momentum backtester:
//! - Domain types (price table, trend score, position, trade)
//! - Trend-quality scorer (OLS on log prices, `slope * r²`) and universe ranker
//! - Walk-forward simulator with strict no-look-ahead windows
//! - Performance analyzer (ROI, drawdown, annualized Sharpe)
//! - Price sources, fallback chain, and Parquet cache
//! - Universe discovery and the live scanner

pub mod analysis;
pub mod data;
pub mod domain;
pub mod engine;
pub mod scanner;
pub mod scoring;
pub mod universe;

pub use analysis::{analyze, analyze_with, DrawdownMethod, PerformanceSummary};
pub use domain::{Position, PriceTable, PriceTableError, Trade, TrendScore};
pub use engine::{run, BacktestConfig, PeriodDecision, PeriodRecord, SimulationError, SimulationResult};
pub use scoring::{select, trend_quality, RankedTicker, Scored};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything a parallel sweep shares or returns is
    /// Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<PriceTable>();
        require_sync::<PriceTable>();
        require_send::<BacktestConfig>();
        require_sync::<BacktestConfig>();
        require_send::<SimulationResult>();
        require_sync::<SimulationResult>();
        require_send::<SimulationError>();
        require_sync::<SimulationError>();
        require_send::<PerformanceSummary>();
        require_sync::<PerformanceSummary>();

        require_send::<data::DataError>();
        require_sync::<data::DataError>();
        require_send::<data::SourceChain>();
        require_sync::<data::SourceChain>();
        require_send::<data::PriceCache>();
        require_sync::<data::PriceCache>();
    }

    /// Architecture contract: the scorer sees only a price slice.
    ///
    /// `score_window` takes `&[f64]` and nothing else, so it cannot reach rows
    /// outside the window the engine cuts for it.
    #[test]
    fn scorer_takes_only_a_window() {
        fn _check(window: &[f64]) -> Scored {
            scoring::score_window(window)
        }
    }
}
