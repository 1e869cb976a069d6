//! Trend-quality scoring and universe ranking.
//!
//! Both halves are pure: a window of prices in, a [`Scored`] value out; a
//! list of scored tickers in, at most one winner out.

pub mod ranker;
pub mod trend_quality;

pub use ranker::{rank, select, RankedTicker};
pub use trend_quality::{score_window, trend_quality, Scored, UnscorableReason};
