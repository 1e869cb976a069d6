//! Experiment configuration: TOML schema, defaults and validation.
//!
//! ```toml
//! [data]
//! tickers = ["NVDA", "AAPL", "MSFT"]
//! start = "2024-01-01"
//! cache_dir = ".cache/prices"
//!
//! [grid]
//! lookbacks = [10, 20, 30]
//! holdings = [5, 10, 15]
//!
//! [backtest]
//! initial_capital = 10000.0
//! drawdown = "peak_to_final"
//!
//! [output]
//! dir = "results"
//! history = "results/history.jsonl"
//! ```
//!
//! Every section and field is optional; missing values take the defaults below.

use chrono::NaiveDate;
use momentumlab_core::DrawdownMethod;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::sweep::ParamGrid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("grid has no lookbacks or no holdings")]
    EmptyGrid,

    #[error("lookback must be at least 2 (got {0})")]
    LookbackTooShort(usize),

    #[error("holding period must be at least 1 (got {0})")]
    HoldingTooShort(usize),

    #[error("initial capital must be positive and finite (got {0})")]
    InvalidCapital(f64),

    #[error("end date {end} is before start date {start}")]
    DateRange { start: NaiveDate, end: NaiveDate },

    #[error("ticker list is empty")]
    EmptyTickers,
}

/// Full experiment: what data, which grid, how to score, where to write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub data: DataSection,
    pub grid: ParamGrid,
    pub backtest: BacktestSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// Explicit universe. When absent, `universe_file` or universe discovery is used.
    pub tickers: Option<Vec<String>>,
    /// TOML file with `tickers = [...]`.
    pub universe_file: Option<PathBuf>,
    pub start: NaiveDate,
    /// Defaults to today.
    pub end: Option<NaiveDate>,
    pub cache_dir: PathBuf,
    /// Never touch the network.
    pub offline: bool,
    /// Append the synthetic source to the chain.
    pub synthetic: bool,
    pub synthetic_seed: u64,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            tickers: None,
            universe_file: None,
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            end: None,
            cache_dir: PathBuf::from(".cache/prices"),
            offline: false,
            synthetic: false,
            synthetic_seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub initial_capital: f64,
    pub drawdown: DrawdownMethod,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            drawdown: DrawdownMethod::PeakToFinal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: PathBuf,
    /// JSONL file each run summary is appended to.
    pub history: Option<PathBuf>,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
            history: Some(PathBuf::from("results/history.jsonl")),
        }
    }
}

impl ExperimentConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid.validate()?;
        let capital = self.backtest.initial_capital;
        if !(capital.is_finite() && capital > 0.0) {
            return Err(ConfigError::InvalidCapital(capital));
        }
        if let Some(end) = self.data.end {
            if end < self.data.start {
                return Err(ConfigError::DateRange {
                    start: self.data.start,
                    end,
                });
            }
        }
        if self.data.tickers.as_ref().is_some_and(|t| t.is_empty()) {
            return Err(ConfigError::EmptyTickers);
        }
        Ok(())
    }

    /// End date, falling back to today.
    pub fn end_date(&self) -> NaiveDate {
        self.data
            .end
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
