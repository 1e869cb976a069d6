//! Walk-forward loop: score, select, trade, record.
//!
//! Steps through the price table at rows `lookback, lookback + holding, ...`.
//! At each decision row `i` every ticker is scored on rows `i - lookback..i`
//! (row `i` excluded), the best ticker is bought at row `i` and sold at row
//! `i + holding` if its score is positive, and one equity value is recorded.

use crate::domain::{Position, PriceTable, Trade};
use crate::scoring::{score_window, select, RankedTicker, Scored};
use tracing::{debug, info};

use super::config::{BacktestConfig, SimulationError};
use super::state::{PeriodDecision, PeriodRecord, SimulationResult};

/// Run one walk-forward simulation.
///
/// Fails fast on an input-contract violation; otherwise always returns a
/// full equity curve (`period_count + 1` entries) and a possibly empty trade log.
pub fn run(config: &BacktestConfig) -> Result<SimulationResult, SimulationError> {
    config.validate()?;

    let prices = config.prices.as_ref();
    let period_count = config.period_count();

    let mut cash = config.initial_capital;
    let mut equity_curve = Vec::with_capacity(period_count + 1);
    let mut trades = Vec::new();
    let mut periods = Vec::with_capacity(period_count);
    equity_curve.push(cash);

    for i in config.period_indices() {
        let date = decision_date(prices, i)?;
        let scores = score_period(prices, &config.universe, i, config.lookback);

        let decision = match select(&scores) {
            None => PeriodDecision::NoCandidates,
            Some(best) if best.score.is_actionable() => {
                let trade = execute(prices, best, i, config.holding)?;
                cash *= 1.0 + trade.roi();
                let ticker = trade.ticker().to_string();
                trades.push(trade);
                PeriodDecision::Traded { ticker }
            }
            Some(best) => PeriodDecision::NonPositiveScore {
                ticker: best.ticker.clone(),
                score: best.score,
            },
        };

        debug!(index = i, %date, scored = scores.len(), cash, ?decision, "period");

        equity_curve.push(cash);
        periods.push(PeriodRecord {
            index: i,
            date,
            scored: scores.len(),
            decision,
        });
    }

    info!(
        lookback = config.lookback,
        holding = config.holding,
        periods = periods.len(),
        trades = trades.len(),
        final_cash = cash,
        "walk-forward run complete"
    );

    Ok(SimulationResult {
        final_cash: cash,
        equity_curve,
        trades,
        periods,
    })
}

/// Score every universe ticker on its trailing window before row `index`.
///
/// Unscorable tickers are left out; the result keeps universe order so the
/// ranker's first-wins tie-break follows the declared universe.
pub fn score_period(
    prices: &PriceTable,
    universe: &[String],
    index: usize,
    lookback: usize,
) -> Vec<RankedTicker> {
    universe
        .iter()
        .filter_map(|ticker| {
            let window = prices.window(ticker, index, lookback)?;
            match score_window(window) {
                Scored::Valid(score) => Some(RankedTicker::new(ticker.clone(), score)),
                Scored::Unscorable(reason) => {
                    debug!(%ticker, index, ?reason, "ticker unscorable");
                    None
                }
            }
        })
        .collect()
}

/// Open at row `entry`, close at `entry + holding`, both read from the full table.
fn execute(
    prices: &PriceTable,
    pick: &RankedTicker,
    entry: usize,
    holding: usize,
) -> Result<Trade, SimulationError> {
    let exit = entry
        .checked_add(holding)
        .ok_or(SimulationError::RowOutOfRange(entry))?;
    let entry_price = tradable_price(prices, &pick.ticker, entry)?;
    let exit_price = tradable_price(prices, &pick.ticker, exit)?;

    Ok(Trade {
        position: Position {
            ticker: pick.ticker.clone(),
            entry_index: entry,
            entry_date: decision_date(prices, entry)?,
            entry_price,
            exit_index: exit,
            exit_date: decision_date(prices, exit)?,
            exit_price,
        },
        score: pick.score,
    })
}

fn tradable_price(prices: &PriceTable, ticker: &str, index: usize) -> Result<f64, SimulationError> {
    match prices.price(ticker, index) {
        Some(p) if p.is_finite() && p > 0.0 => Ok(p),
        _ => Err(SimulationError::MissingPrice {
            ticker: ticker.to_string(),
            index,
            date: prices.date(index),
        }),
    }
}

fn decision_date(prices: &PriceTable, index: usize) -> Result<chrono::NaiveDate, SimulationError> {
    prices
        .date(index)
        .ok_or(SimulationError::RowOutOfRange(index))
}
