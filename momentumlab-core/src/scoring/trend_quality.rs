//! ROC² trend quality: log-linear slope weighted by fit quality.
//!
//! Prices are log-transformed so that a constant percentage gain becomes a
//! constant slope, then regressed against the step index 0..n-1 by ordinary
//! least squares. With `r` the Pearson correlation of that fit:
//!
//! ```text
//! score = slope * r²
//! ```
//!
//! Slope alone rewards magnitude regardless of noise and r² alone rewards
//! smoothness regardless of direction; the product is large only for smooth
//! uptrends and negative for smooth downtrends.

use crate::domain::TrendScore;
use serde::{Deserialize, Serialize};

/// Why a window produced no score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnscorableReason {
    /// Fewer than two prices.
    TooShort { len: usize },
    /// A cell is NaN or infinite.
    MissingPrice { index: usize },
    /// A price is zero or negative, so its logarithm is undefined.
    NonPositivePrice { index: usize },
    /// Zero variance in log-price (perfectly flat), so the correlation is undefined.
    Degenerate,
}

/// Outcome of scoring one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scored {
    Valid(TrendScore),
    Unscorable(UnscorableReason),
}

impl Scored {
    /// The score triple, with every unscorable window mapped to `(0, 0, 0)`.
    pub fn triple(&self) -> TrendScore {
        match self {
            Scored::Valid(score) => *score,
            Scored::Unscorable(_) => TrendScore::ZERO,
        }
    }

    pub fn valid(&self) -> Option<TrendScore> {
        match self {
            Scored::Valid(score) => Some(*score),
            Scored::Unscorable(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Scored::Valid(_))
    }
}

/// Score one window. Never panics and never yields NaN.
pub fn score_window(window: &[f64]) -> Scored {
    let n = window.len();
    if n < 2 {
        return Scored::Unscorable(UnscorableReason::TooShort { len: n });
    }

    let mut log_prices = Vec::with_capacity(n);
    for (index, &price) in window.iter().enumerate() {
        if !price.is_finite() {
            return Scored::Unscorable(UnscorableReason::MissingPrice { index });
        }
        if price <= 0.0 {
            return Scored::Unscorable(UnscorableReason::NonPositivePrice { index });
        }
        log_prices.push(price.ln());
    }

    let (lo, hi) = log_prices
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &y| {
            (lo.min(y), hi.max(y))
        });
    if hi - lo == 0.0 {
        return Scored::Unscorable(UnscorableReason::Degenerate);
    }

    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = log_prices.iter().sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (i, &y) in log_prices.iter().enumerate() {
        let dx = i as f64 - x_mean;
        let dy = y - y_mean;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    if syy <= 0.0 {
        return Scored::Unscorable(UnscorableReason::Degenerate);
    }

    let slope = sxy / sxx;
    // Rounding can push |r| a hair past 1.
    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    if !slope.is_finite() || !r.is_finite() {
        return Scored::Unscorable(UnscorableReason::Degenerate);
    }

    Scored::Valid(TrendScore::new(slope, r * r))
}

/// Convenience wrapper returning the triple directly.
pub fn trend_quality(window: &[f64]) -> TrendScore {
    score_window(window).triple()
}
