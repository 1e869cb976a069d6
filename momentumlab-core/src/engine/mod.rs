//! Walk-forward engine: period loop, configuration, and run result types.
//!
//! The engine consumes an immutable [`PriceTable`](crate::domain::PriceTable)
//! and steps through it in holding-period jumps. Each period:
//!
//! 1. Scoring: trailing window per ticker, strictly before the decision row
//! 2. Deciding: rank scored tickers, keep the winner only if its score > 0
//! 3. Executing: enter at the decision row, exit `holding` rows later
//! 4. Recording: one equity-curve entry, traded or not

pub mod config;
pub mod state;
pub mod walk_forward;

pub use config::{BacktestConfig, SimulationError};
pub use state::{PeriodDecision, PeriodRecord, SimulationResult};
pub use walk_forward::{run, score_period};
