//! MomentumLab CLI: backtest, sweep, scan, universe, and cache commands.
//!
//! Commands:
//! - `backtest`: one (lookback, holding) walk-forward run, artifacts saved
//! - `sweep`: grid search over lookbacks × holdings, ranked by ROI
//! - `scan`: rank tickers by current trend quality, write `todays_picks.csv`
//! - `universe`: print the resolved universe and where it came from
//! - `cache status`: list cached price tables
//!
//! Logging goes to stderr; set `RUST_LOG` to override the default
//! `momentumlab=info` filter.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use momentumlab_core::data::PriceCache;
use momentumlab_core::scanner::{scan, ScanConfig};
use momentumlab_core::DrawdownMethod;
use momentumlab_runner::data_loader::{load_scan_prices, resolve_universe, LoadOptions};
use momentumlab_runner::export::{export_picks_csv, save_artifacts, save_sweep};
use momentumlab_runner::runner::load_for_experiment;
use momentumlab_runner::{
    run_backtest, run_sweep, BacktestResult, ExperimentConfig, HistoryEntry, ParamGrid,
    RunHistory, RunSpec, SweepResults,
};

#[derive(Parser)]
#[command(
    name = "momentumlab",
    about = "MomentumLab CLI: trend-quality momentum walk-forward backtester"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one walk-forward backtest and save its artifacts.
    Backtest {
        #[command(flatten)]
        data: DataArgs,

        /// Trailing window length used for scoring.
        #[arg(long, default_value_t = 20)]
        lookback: usize,

        /// Trading days each position is held.
        #[arg(long, default_value_t = 10)]
        holding: usize,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Sweep lookbacks × holdings and rank the runs by ROI.
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        /// Lookback windows, comma separated. Defaults to 10,20,30.
        #[arg(long, value_delimiter = ',')]
        lookbacks: Option<Vec<usize>>,

        /// Holding periods, comma separated. Defaults to 5,10,15.
        #[arg(long, value_delimiter = ',')]
        holdings: Option<Vec<usize>>,

        /// Also save the full artifact set of every run.
        #[arg(long, default_value_t = false)]
        save_runs: bool,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Rank tickers by their most recent trend quality.
    Scan {
        #[command(flatten)]
        data: DataArgs,

        #[arg(long, default_value_t = 20)]
        lookback: usize,

        /// Minimum R² (exclusive).
        #[arg(long = "min-r2", default_value_t = 0.8)]
        min_r_squared: f64,

        /// Number of picks to keep.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// CSV output path.
        #[arg(long, default_value = "todays_picks.csv")]
        output: PathBuf,
    },
    /// Print the resolved universe and its provenance.
    Universe {
        #[command(flatten)]
        data: DataArgs,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached price tables.
    Status {
        /// Cache directory. Defaults to the config value, else ./.cache/prices.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

/// Data flags shared by every command that loads prices. Flags override the
/// config file, which overrides the built-in defaults.
#[derive(Args, Clone, Default)]
struct DataArgs {
    /// Experiment TOML file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tickers, comma separated. Overrides universe discovery.
    #[arg(long, value_delimiter = ',')]
    tickers: Option<Vec<String>>,

    /// TOML file with `tickers = [...]`.
    #[arg(long)]
    universe_file: Option<PathBuf>,

    /// Start date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,

    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Offline mode: no network access.
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Fall back to seeded synthetic prices.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Seed for synthetic prices.
    #[arg(long)]
    seed: Option<u64>,
}

/// Flags shared by `backtest` and `sweep`.
#[derive(Args, Clone, Default)]
struct RunArgs {
    /// Starting cash.
    #[arg(long)]
    capital: Option<f64>,

    #[arg(long, value_enum)]
    drawdown: Option<DrawdownArg>,

    /// Output directory for artifacts.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Do not append to the run history file.
    #[arg(long, default_value_t = false)]
    no_history: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DrawdownArg {
    PeakToFinal,
    PeakToTrough,
}

impl From<DrawdownArg> for DrawdownMethod {
    fn from(arg: DrawdownArg) -> Self {
        match arg {
            DrawdownArg::PeakToFinal => DrawdownMethod::PeakToFinal,
            DrawdownArg::PeakToTrough => DrawdownMethod::PeakToTrough,
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("momentumlab=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            data,
            lookback,
            holding,
            run,
        } => run_backtest_cmd(&data, lookback, holding, &run),
        Commands::Sweep {
            data,
            lookbacks,
            holdings,
            save_runs,
            run,
        } => run_sweep_cmd(&data, lookbacks, holdings, save_runs, &run),
        Commands::Scan {
            data,
            lookback,
            min_r_squared,
            top,
            output,
        } => run_scan_cmd(
            &data,
            ScanConfig {
                lookback,
                min_r_squared,
                top,
            },
            &output,
        ),
        Commands::Universe { data } => run_universe_cmd(&data),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(cache_dir),
        },
    }
}

// ── Config assembly ──────────────────────────────────────────────────

fn build_config(data: &DataArgs, run: Option<&RunArgs>) -> Result<ExperimentConfig> {
    let mut config = match &data.config {
        Some(path) => ExperimentConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ExperimentConfig::default(),
    };

    let d = &mut config.data;
    if let Some(tickers) = &data.tickers {
        d.tickers = Some(tickers.clone());
    }
    if let Some(path) = &data.universe_file {
        d.universe_file = Some(path.clone());
    }
    if let Some(start) = data.start {
        d.start = start;
    }
    if data.end.is_some() {
        d.end = data.end;
    }
    if let Some(dir) = &data.cache_dir {
        d.cache_dir = dir.clone();
    }
    d.offline |= data.offline;
    d.synthetic |= data.synthetic;
    if let Some(seed) = data.seed {
        d.synthetic_seed = seed;
    }

    if let Some(run) = run {
        if let Some(capital) = run.capital {
            config.backtest.initial_capital = capital;
        }
        if let Some(drawdown) = run.drawdown {
            config.backtest.drawdown = drawdown.into();
        }
        if let Some(dir) = &run.output_dir {
            config.output.dir = dir.clone();
        }
        if run.no_history {
            config.output.history = None;
        }
    }

    config.validate()?;
    Ok(config)
}

fn record_history(config: &ExperimentConfig, results: &[BacktestResult]) {
    let Some(path) = &config.output.history else {
        return;
    };
    let entries: Vec<HistoryEntry> = results.iter().map(HistoryEntry::from_result).collect();
    // History is best-effort; a write failure does not discard the run.
    match RunHistory::new(path).append_all(&entries) {
        Ok(()) => info!(path = %path.display(), runs = entries.len(), "history updated"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not append to history"),
    }
}

// ── Commands ─────────────────────────────────────────────────────────

fn run_backtest_cmd(data: &DataArgs, lookback: usize, holding: usize, run: &RunArgs) -> Result<()> {
    let config = build_config(data, Some(run))?;
    let loaded = load_for_experiment(&config)?;
    let result = run_backtest(
        &loaded,
        RunSpec {
            lookback,
            holding,
            initial_capital: config.backtest.initial_capital,
            drawdown: config.backtest.drawdown,
        },
    )?;

    print_summary(&result);

    let run_dir = save_artifacts(&result, &config.output.dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    record_history(&config, std::slice::from_ref(&result));
    Ok(())
}

fn run_sweep_cmd(
    data: &DataArgs,
    lookbacks: Option<Vec<usize>>,
    holdings: Option<Vec<usize>>,
    save_runs: bool,
    run: &RunArgs,
) -> Result<()> {
    let mut config = build_config(data, Some(run))?;
    if let Some(lookbacks) = lookbacks {
        config.grid.lookbacks = lookbacks;
    }
    if let Some(holdings) = holdings {
        config.grid.holdings = holdings;
    }
    config.validate()?;

    let loaded = load_for_experiment(&config)?;
    let grid: &ParamGrid = &config.grid;
    let sweep = run_sweep(
        &loaded,
        grid,
        config.backtest.initial_capital,
        config.backtest.drawdown,
    )?;

    print_sweep(&sweep);

    let path = save_sweep(&sweep, &config.output.dir)?;
    println!("Sweep summary saved to: {}", path.display());
    if save_runs {
        for result in &sweep.results {
            save_artifacts(result, &config.output.dir)?;
        }
        println!("Saved {} run artifact sets", sweep.len());
    }
    record_history(&config, &sweep.results);
    Ok(())
}

fn run_scan_cmd(data: &DataArgs, scan_config: ScanConfig, output: &Path) -> Result<()> {
    let mut config = build_config(data, None)?;
    let today = chrono::Local::now().date_naive();
    if data.start.is_none() {
        // About three months of history covers a 20-day window with room to spare.
        config.data.start = today - chrono::Duration::days(92);
    }

    let universe = resolve_universe(&config.data)?;
    info!(source = %universe.source, tickers = universe.tickers.len(), "scanning universe");

    let opts = LoadOptions::from_section(&config.data, config.data.end.unwrap_or(today));
    let loaded = load_scan_prices(&universe.tickers, &opts)?;
    let picks = scan(&loaded.prices, &loaded.universe, &scan_config);

    if picks.is_empty() {
        println!("No tickers passed the filter (score > 0, R² > {}).", scan_config.min_r_squared);
    } else {
        println!();
        println!("{:<8} {:>10} {:>6} {:>10} {:>10}", "Ticker", "Score", "R2", "Slope", "Price");
        println!("{}", "-".repeat(48));
        for p in &picks {
            println!(
                "{:<8} {:>10.5} {:>6.3} {:>10.5} {:>10.2}",
                p.ticker, p.score, p.r_squared, p.slope, p.current_price
            );
        }
    }

    std::fs::write(output, export_picks_csv(&picks)?)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Picks saved to: {}", output.display());
    Ok(())
}

fn run_universe_cmd(data: &DataArgs) -> Result<()> {
    let config = build_config(data, None)?;
    let universe = resolve_universe(&config.data)?;
    println!("Source:  {}", universe.source);
    println!("Tickers: {}", universe.tickers.len());
    println!("{}", universe.tickers.join(", "));
    Ok(())
}

fn run_cache_status(cache_dir: Option<PathBuf>) -> Result<()> {
    let cache_dir = cache_dir.unwrap_or_else(|| ExperimentConfig::default().data.cache_dir);
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = PriceCache::new(cache_dir.clone());
    let entries = cache.entries()?;
    if entries.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let mut total_size = 0u64;
    println!("Cache: {}", cache_dir.display());
    println!();
    println!(
        "{:<18} {:<20} {:>7} {:<25} {:>6} {:>10}",
        "Key", "Source", "Tickers", "Date Range", "Rows", "Size"
    );
    println!("{}", "-".repeat(92));
    for meta in &entries {
        let size = std::fs::metadata(cache_dir.join(format!("prices_{}.parquet", meta.key)))
            .map(|m| m.len())
            .unwrap_or(0);
        total_size += size;
        let range = match (meta.first_date, meta.last_date) {
            (Some(first), Some(last)) => format!("{first} to {last}"),
            _ => "(empty)".to_string(),
        };
        println!(
            "{:<18} {:<20} {:>7} {:<25} {:>6} {:>10}",
            meta.key,
            meta.source,
            meta.tickers.len(),
            range,
            meta.rows,
            format_size(size)
        );
    }
    println!();
    println!("Tables: {}  Total size: {}", entries.len(), format_size(total_size));
    Ok(())
}

// ── Output ───────────────────────────────────────────────────────────

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn print_summary(result: &BacktestResult) {
    let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
    println!();
    println!("=== {} ===", result.name);
    println!("Universe:       {}", result.universe.join(", "));
    println!(
        "Period:         {} to {}",
        date(result.start_date),
        date(result.end_date)
    );
    println!("Source:         {}", result.source);
    println!("Periods:        {}", result.periods.len());
    println!("Trades:         {}", result.trade_count);
    println!();
    println!("--- Performance ---");
    println!("ROI:            {:.2}%", result.summary.roi * 100.0);
    println!("Final Value:    ${:.2}", result.final_value);
    println!(
        "Max Drawdown:   {:.2}%",
        result.summary.max_drawdown * 100.0
    );
    println!("Sharpe:         {:.3}", result.summary.sharpe);
    println!("Win Rate:       {:.1}%", result.win_rate * 100.0);
    if result.is_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}

fn print_sweep(sweep: &SweepResults) {
    println!();
    println!(
        "{:<18} {:>9} {:>12} {:>9} {:>8} {:>7}",
        "Run", "ROI", "Final", "Max DD", "Sharpe", "Trades"
    );
    println!("{}", "-".repeat(68));
    for row in sweep.rows() {
        println!(
            "{:<18} {:>8.2}% {:>12.2} {:>8.2}% {:>8.3} {:>7}",
            row.name,
            row.roi * 100.0,
            row.final_value,
            row.max_drawdown * 100.0,
            row.sharpe,
            row.num_trades
        );
    }
    if sweep.results.iter().any(|r| r.is_synthetic) {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}
