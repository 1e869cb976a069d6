//! TrendScore: the (score, slope, r²) triple produced for one window.

use serde::{Deserialize, Serialize};

/// Trend-quality triple for one ticker over one lookback window.
///
/// `score = slope * r_squared`. `slope` is the per-step log-return rate of
/// the least-squares fit; `r_squared` is in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendScore {
    pub score: f64,
    pub slope: f64,
    pub r_squared: f64,
}

impl TrendScore {
    /// The neutral triple used for windows that cannot be scored.
    pub const ZERO: TrendScore = TrendScore {
        score: 0.0,
        slope: 0.0,
        r_squared: 0.0,
    };

    pub fn new(slope: f64, r_squared: f64) -> Self {
        Self {
            score: slope * r_squared,
            slope,
            r_squared,
        }
    }

    /// Only strictly positive scores are tradable.
    pub fn is_actionable(&self) -> bool {
        self.score > 0.0
    }
}
