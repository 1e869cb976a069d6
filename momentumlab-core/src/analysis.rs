//! Performance metrics: pure functions over the equity curve.
//!
//! Every metric is a pure function: equity curve in, scalar out. The curve is
//! the simulator's per-period cash series, so "period" here means one holding
//! period, not one trading day.

use serde::{Deserialize, Serialize};

/// Trading days per year used to annualize period returns.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Which reference points define drawdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawdownMethod {
    /// `(peak - final) / peak`, with `peak` the highest value ever seen.
    #[default]
    PeakToFinal,
    /// Largest running peak-to-trough decline anywhere on the curve.
    PeakToTrough,
}

/// Summary statistics for one equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// `(final - initial) / initial`.
    pub roi: f64,
    /// Positive fraction, e.g. 0.15 for a 15% drawdown.
    pub max_drawdown: f64,
    /// Annualized mean/stdev of period returns.
    pub sharpe: f64,
}

/// Analyze an equity curve with the default peak-to-final drawdown.
pub fn analyze(equity_curve: &[f64], holding_period: usize) -> PerformanceSummary {
    analyze_with(equity_curve, holding_period, DrawdownMethod::PeakToFinal)
}

pub fn analyze_with(
    equity_curve: &[f64],
    holding_period: usize,
    drawdown: DrawdownMethod,
) -> PerformanceSummary {
    let max_drawdown = match drawdown {
        DrawdownMethod::PeakToFinal => peak_to_final_drawdown(equity_curve),
        DrawdownMethod::PeakToTrough => peak_to_trough_drawdown(equity_curve),
    };
    PerformanceSummary {
        roi: total_return(equity_curve),
        max_drawdown,
        sharpe: sharpe_ratio(equity_curve, holding_period),
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction of the first curve value.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if initial > 0.0 => (last - initial) / initial,
        _ => 0.0,
    }
}

/// Drawdown of the final value from the curve's all-time peak.
///
/// This is not the worst decline along the path: a curve that dips and
/// fully recovers reports zero.
pub fn peak_to_final_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&last) = equity_curve.last() else {
        return 0.0;
    };
    let peak = equity_curve.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if peak > 0.0 {
        (peak - last) / peak
    } else {
        0.0
    }
}

/// Largest running peak-to-trough decline, as a positive fraction.
pub fn peak_to_trough_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd
}

/// Simple percentage change between consecutive curve entries.
pub fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Annualized Sharpe ratio of period returns, zero risk-free rate.
///
/// `sharpe = mean / stdev * sqrt(252 / holding_period)`. Returns 0.0 for
/// fewer than two curve points or (near-)zero deviation.
pub fn sharpe_ratio(equity_curve: &[f64], holding_period: usize) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let returns = period_returns(equity_curve);
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    let periods_per_year = TRADING_DAYS_PER_YEAR / holding_period.max(1) as f64;
    (mean_f64(&returns) / std) * periods_per_year.sqrt()
}

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
