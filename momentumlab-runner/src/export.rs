//! Reporting and export: JSON, CSV, and Markdown artifacts.
//!
//! - **JSON**: full `BacktestResult` with schema versioning
//! - **CSV**: trade log, equity curve, sweep summary, scanner picks
//! - **Markdown**: human-readable single-run report
//!
//! Persisted manifests carry a `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use momentumlab_core::scanner::Pick;
use momentumlab_core::Trade;

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::sweep::SweepResults;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Trade log.
///
/// Columns: date, ticker, score, slope, r_squared, buy, sell, roi, exit_date
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date", "ticker", "score", "slope", "r_squared", "buy", "sell", "roi", "exit_date",
    ])?;

    for t in trades {
        let p = &t.position;
        wtr.write_record([
            &p.entry_date.to_string(),
            &p.ticker,
            &format!("{:.6}", t.score.score),
            &format!("{:.6}", t.score.slope),
            &format!("{:.4}", t.score.r_squared),
            &format!("{:.4}", p.entry_price),
            &format!("{:.4}", p.exit_price),
            &format!("{:.6}", t.roi()),
            &p.exit_date.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Equity curve, one row per rebalance point.
///
/// Row 0 is the initial capital and has no date; later rows carry the
/// decision date of the period that produced them.
pub fn export_equity_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["period", "date", "equity"])?;
    for (i, eq) in result.equity_curve.iter().enumerate() {
        let date = i
            .checked_sub(1)
            .and_then(|p| result.periods.get(p))
            .map(|p| p.date.to_string())
            .unwrap_or_default();
        wtr.write_record([&i.to_string(), &date, &format!("{:.2}", eq)])?;
    }
    finish(wtr)
}

/// Sweep summary, in the sweep's ranking order.
pub fn export_sweep_csv(sweep: &SweepResults) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in sweep.rows() {
        wtr.serialize(row)?;
    }
    finish(wtr)
}

/// Scanner output with the `Ticker,Score,R2,Momentum_Slope,Current_Price` header.
pub fn export_picks_csv(picks: &[Pick]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    if picks.is_empty() {
        wtr.write_record(["Ticker", "Score", "R2", "Momentum_Slope", "Current_Price"])?;
    }
    for pick in picks {
        wtr.serialize(pick)?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Save the full artifact set for a single run.
///
/// Creates `win_{lookback}_hold_{holding}_{timestamp}/` under `output_dir` with
/// `manifest.json`, `trades.csv`, `equity.csv` and `report.md`.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "win_{}_hold_{}_{}",
        result.spec.lookback,
        result.spec.holding,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write_file(&run_dir.join("manifest.json"), &export_json(result)?)?;
    write_file(&run_dir.join("trades.csv"), &export_trades_csv(&result.trades)?)?;
    write_file(&run_dir.join("equity.csv"), &export_equity_csv(result)?)?;
    write_file(&run_dir.join("report.md"), &generate_report(result))?;

    Ok(run_dir)
}

/// Write `sweep_results.csv` under `output_dir`.
pub fn save_sweep(sweep: &SweepResults, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let path = output_dir.join("sweep_results.csv");
    write_file(&path, &export_sweep_csv(sweep)?)?;
    Ok(path)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(1024);

    md.push_str(&format!("# Backtest Report: {}\n\n", result.name));

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run ID | {} |\n", result.run_id));
    md.push_str(&format!("| Universe | {} |\n", result.universe.join(", ")));
    let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        date(result.start_date),
        date(result.end_date)
    ));
    md.push_str(&format!("| Lookback | {} |\n", result.spec.lookback));
    md.push_str(&format!("| Holding | {} |\n", result.spec.holding));
    md.push_str(&format!(
        "| Initial Capital | ${:.0} |\n",
        result.spec.initial_capital
    ));
    md.push_str(&format!("| Source | {} |\n", result.source));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    if result.is_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    md.push_str("## Performance\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| ROI | {:.2}% |\n", result.summary.roi * 100.0));
    md.push_str(&format!("| Final Value | ${:.2} |\n", result.final_value));
    md.push_str(&format!(
        "| Max Drawdown | {:.2}% |\n",
        result.summary.max_drawdown * 100.0
    ));
    md.push_str(&format!("| Sharpe | {:.3} |\n", result.summary.sharpe));
    md.push_str(&format!("| Trades | {} |\n", result.trade_count));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", result.win_rate * 100.0));
    md.push_str(&format!("| Periods | {} |\n", result.periods.len()));
    md.push('\n');

    if !result.trades.is_empty() {
        md.push_str("## Trades\n\n");
        md.push_str("| Date | Ticker | Score | Buy | Sell | ROI |\n");
        md.push_str("| --- | --- | --- | --- | --- | --- |\n");
        for t in &result.trades {
            md.push_str(&format!(
                "| {} | {} | {:.5} | {:.2} | {:.2} | {:.2}% |\n",
                t.position.entry_date,
                t.ticker(),
                t.score.score,
                t.position.entry_price,
                t.position.exit_price,
                t.roi() * 100.0
            ));
        }
    }

    md
}
