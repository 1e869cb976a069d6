//! Property tests for scoring, ranking, and engine invariants.
//!
//! Uses proptest to verify:
//! 1. Scorer totality: any window yields finite values with r² in [0, 1]
//! 2. Scorer scale invariance: multiplying prices by a constant keeps the score
//! 3. Ranker argmax: the selection has the maximum score, first one on ties
//! 4. Equity accounting: curve length is periods + 1 and cash stays positive

use chrono::NaiveDate;
use momentumlab_core::engine::{run, BacktestConfig};
use momentumlab_core::scoring::{select, trend_quality, RankedTicker};
use momentumlab_core::{PriceTable, TrendScore};
use proptest::prelude::*;
use std::sync::Arc;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_window() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(arb_price(), 0..60)
}

fn arb_any_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        arb_price(),
        Just(0.0),
        Just(-3.5),
        Just(f64::NAN),
        Just(f64::INFINITY),
    ]
}

fn arb_scores() -> impl Strategy<Value = Vec<f64>> {
    // Small integer-valued scores so ties actually happen.
    prop::collection::vec((-5i32..5).prop_map(|s| s as f64 / 100.0), 0..20)
}

// ── 1–2. Scorer ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn scorer_output_always_finite(window in prop::collection::vec(arb_any_value(), 0..40)) {
        let s = trend_quality(&window);
        prop_assert!(s.score.is_finite());
        prop_assert!(s.slope.is_finite());
        prop_assert!((0.0..=1.0).contains(&s.r_squared));
        prop_assert!((s.score - s.slope * s.r_squared).abs() < 1e-12);
    }

    #[test]
    fn scorer_is_scale_invariant(window in arb_window(), factor in 0.01..100.0_f64) {
        let scaled: Vec<f64> = window.iter().map(|p| p * factor).collect();
        let a = trend_quality(&window);
        let b = trend_quality(&scaled);
        prop_assert!((a.slope - b.slope).abs() < 1e-9);
        // Degenerate windows can flip to nearly-degenerate after scaling; only
        // compare fits that explain some variance.
        if a.r_squared > 1e-6 {
            prop_assert!((a.r_squared - b.r_squared).abs() < 1e-6);
        }
    }
}

// ── 3. Ranker argmax ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn select_returns_first_maximum(scores in arb_scores()) {
        let entries: Vec<RankedTicker> = scores
            .iter()
            .enumerate()
            .map(|(i, &s)| RankedTicker::new(format!("T{i}"), TrendScore { score: s, slope: s, r_squared: 1.0 }))
            .collect();

        match select(&entries) {
            None => prop_assert!(entries.is_empty()),
            Some(best) => {
                let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                prop_assert_eq!(best.score.score, max);
                let first = scores.iter().position(|&s| s == max).unwrap();
                prop_assert_eq!(&best.ticker, &format!("T{first}"));
            }
        }
    }
}

// ── 4. Equity accounting ─────────────────────────────────────────────

fn arb_table() -> impl Strategy<Value = PriceTable> {
    (2usize..4, 5usize..80).prop_flat_map(|(tickers, rows)| {
        prop::collection::vec(prop::collection::vec(arb_price(), rows), tickers).prop_map(
            move |columns| {
                let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
                let dates = (0..rows)
                    .map(|i| start + chrono::Duration::days(i as i64))
                    .collect();
                let columns = columns
                    .into_iter()
                    .enumerate()
                    .map(|(k, c)| (format!("T{k}"), c))
                    .collect();
                PriceTable::new(dates, columns).unwrap()
            },
        )
    })
}

proptest! {
    #[test]
    fn equity_curve_length_and_positivity(
        table in arb_table(),
        lookback in 2usize..30,
        holding in 1usize..15,
    ) {
        let universe = table.tickers().to_vec();
        let config = BacktestConfig::new(lookback, holding, 10_000.0, universe, Arc::new(table));
        let result = run(&config).unwrap();

        prop_assert_eq!(result.equity_curve.len(), config.period_count() + 1);
        prop_assert_eq!(result.equity_curve.len(), result.periods.len() + 1);
        prop_assert!(result.trades.len() <= result.periods.len());
        prop_assert!(result.equity_curve.iter().all(|v| *v > 0.0 && v.is_finite()));
        prop_assert_eq!(*result.equity_curve.last().unwrap(), result.final_cash);

        // Cash only moves on trades.
        let compounded = result
            .trades
            .iter()
            .fold(10_000.0, |cash, t| cash * (1.0 + t.roi()));
        prop_assert!((compounded - result.final_cash).abs() <= 1e-6 * result.final_cash);
    }
}
