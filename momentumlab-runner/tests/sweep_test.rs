//! Integration tests for the grid sweep.
//!
//! Tests:
//! 1. An offline synthetic experiment runs the full default grid
//! 2. Sweep results are ranked by ROI, ties broken by (lookback, holding)
//! 3. Repeated sweeps are identical regardless of thread scheduling
//! 4. A rising ticker is always chosen over a flat one

use chrono::NaiveDate;
use momentumlab_core::data::SourceKind;
use momentumlab_core::engine::PeriodDecision;
use momentumlab_core::{DrawdownMethod, PriceTable};
use momentumlab_runner::{run_experiment, run_sweep, ExperimentConfig, LoadedPrices, ParamGrid};

// ── Helpers ──────────────────────────────────────────────────────────

fn offline_config(cache_dir: &std::path::Path) -> ExperimentConfig {
    let mut config = ExperimentConfig::from_toml(
        r#"
        [data]
        tickers = ["NVDA", "AAPL", "MSFT", "AMD"]
        start = "2023-01-01"
        end = "2023-12-31"
        offline = true
        synthetic = true
        synthetic_seed = 7
        "#,
    )
    .unwrap();
    config.data.cache_dir = cache_dir.to_path_buf();
    config
}

fn rising_and_flat(rows: usize) -> LoadedPrices {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let dates = (0..rows)
        .map(|i| start + chrono::Duration::days(i as i64))
        .collect();
    let table = PriceTable::new(
        dates,
        vec![
            ("FLAT".into(), vec![50.0; rows]),
            ("RISE".into(), (0..rows).map(|i| 20.0 * 1.01_f64.powi(i as i32)).collect()),
        ],
    )
    .unwrap();
    LoadedPrices::from_table(table, "fixture", SourceKind::Cache)
}

// ── 1. Full experiment ───────────────────────────────────────────────

#[test]
fn offline_synthetic_experiment_runs_full_grid() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = run_experiment(&offline_config(dir.path())).unwrap();

    assert_eq!(sweep.len(), 9);
    for result in &sweep.results {
        assert!(result.is_synthetic);
        assert_eq!(result.source, "synthetic");
        assert_eq!(result.equity_curve.len(), result.periods.len() + 1);
        assert_eq!(result.trade_count, result.trades.len());
        assert_eq!(result.final_value, *result.equity_curve.last().unwrap());
    }

    let names: std::collections::BTreeSet<_> = sweep.results.iter().map(|r| r.name.clone()).collect();
    assert!(names.contains("Win_10_Hold_5"));
    assert!(names.contains("Win_30_Hold_15"));
}

// ── 2. Ranking ───────────────────────────────────────────────────────

#[test]
fn results_are_ranked_by_roi() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = run_experiment(&offline_config(dir.path())).unwrap();

    for pair in sweep.results.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.summary.roi >= b.summary.roi);
        if a.summary.roi == b.summary.roi {
            assert!((a.spec.lookback, a.spec.holding) < (b.spec.lookback, b.spec.holding));
        }
    }
    assert_eq!(sweep.best().unwrap().name, sweep.rows()[0].name);
}

#[test]
fn zero_trade_ties_fall_back_to_grid_order() {
    // On 8 rows only (5, 1) has periods; the other cells never trade and tie at 0.
    let loaded = rising_and_flat(8);
    let grid = ParamGrid::new(vec![10, 5], vec![3, 1]);
    let sweep = run_sweep(&loaded, &grid, 10_000.0, DrawdownMethod::PeakToFinal).unwrap();

    let order: Vec<(usize, usize)> = sweep
        .results
        .iter()
        .map(|r| (r.spec.lookback, r.spec.holding))
        .collect();
    assert_eq!(order, vec![(5, 1), (5, 3), (10, 1), (10, 3)]);
    assert!(sweep.results[0].summary.roi > 0.0);
    assert!(sweep.results[1..].iter().all(|r| r.trade_count == 0 && r.summary.roi == 0.0));
}

// ── 3. Determinism ───────────────────────────────────────────────────

#[test]
fn repeated_sweeps_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = offline_config(dir.path());
    let a = run_experiment(&config).unwrap();
    let b = run_experiment(&config).unwrap();
    assert_eq!(a.rows(), b.rows());
    let ids_a: Vec<_> = a.results.iter().map(|r| r.run_id.clone()).collect();
    let ids_b: Vec<_> = b.results.iter().map(|r| r.run_id.clone()).collect();
    assert_eq!(ids_a, ids_b);
}

// ── 4. Rising beats flat ─────────────────────────────────────────────

#[test]
fn rising_ticker_always_selected() {
    let loaded = rising_and_flat(120);
    let sweep = run_sweep(&loaded, &ParamGrid::default(), 10_000.0, DrawdownMethod::PeakToFinal).unwrap();

    for result in &sweep.results {
        assert!(!result.trades.is_empty());
        assert!(result.trades.iter().all(|t| t.ticker() == "RISE"));
        assert!(result
            .periods
            .iter()
            .all(|p| p.decision == PeriodDecision::Traded { ticker: "RISE".into() }));
        assert!(result.summary.roi > 0.0);
        assert_eq!(result.summary.max_drawdown, 0.0);
    }
}
