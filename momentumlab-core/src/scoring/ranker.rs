//! Universe ranker: pick the single best-scoring ticker of a period.
//!
//! Tie-break: when several tickers share the maximum score exactly, the one
//! that appears first in the input wins. The simulator builds its input in
//! universe order, so "first" means first in the declared universe.

use crate::domain::TrendScore;
use serde::{Deserialize, Serialize};

/// A ticker paired with its score for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedTicker {
    pub ticker: String,
    pub score: TrendScore,
}

impl RankedTicker {
    pub fn new(ticker: impl Into<String>, score: TrendScore) -> Self {
        Self {
            ticker: ticker.into(),
            score,
        }
    }
}

/// Argmax over `score`, first occurrence winning ties. `None` on empty input.
///
/// The sign of the winning score is not checked here.
pub fn select(scores: &[RankedTicker]) -> Option<&RankedTicker> {
    let mut best: Option<&RankedTicker> = None;
    for candidate in scores {
        match best {
            Some(current) if candidate.score.score <= current.score.score => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// All entries sorted by descending score, input order preserved among ties.
pub fn rank(scores: &[RankedTicker]) -> Vec<&RankedTicker> {
    let mut ranked: Vec<&RankedTicker> = scores.iter().collect();
    ranked.sort_by(|a, b| b.score.score.total_cmp(&a.score.score));
    ranked
}
