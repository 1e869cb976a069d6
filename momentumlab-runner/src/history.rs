//! Experiment history: JSONL append-only log of run summaries.
//!
//! One JSON object per line, so a crash mid-write loses at most one entry and
//! the file can be streamed or grepped. Malformed lines are skipped on read.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::runner::BacktestResult;

/// Flat summary of one run, as logged to the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub run_id: String,
    pub name: String,
    pub recorded_at: DateTime<Utc>,
    pub lookback: usize,
    pub holding: usize,
    pub initial_capital: f64,
    pub roi: f64,
    pub final_value: f64,
    pub max_drawdown: f64,
    pub sharpe: f64,
    pub num_trades: usize,
    pub universe: Vec<String>,
    pub source: String,
    pub dataset_hash: String,
    #[serde(default)]
    pub is_synthetic: bool,
}

impl HistoryEntry {
    pub fn from_result(result: &BacktestResult) -> Self {
        Self {
            run_id: result.run_id.clone(),
            name: result.name.clone(),
            recorded_at: Utc::now(),
            lookback: result.spec.lookback,
            holding: result.spec.holding,
            initial_capital: result.spec.initial_capital,
            roi: result.summary.roi,
            final_value: result.final_value,
            max_drawdown: result.summary.max_drawdown,
            sharpe: result.summary.sharpe,
            num_trades: result.trade_count,
            universe: result.universe.clone(),
            source: result.source.clone(),
            dataset_hash: result.dataset_hash.clone(),
            is_synthetic: result.is_synthetic,
        }
    }
}

/// JSONL history file manager.
pub struct RunHistory {
    path: PathBuf,
}

impl RunHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one entry, creating the file and its parent directory if needed.
    pub fn append(&self, entry: &HistoryEntry) -> io::Result<()> {
        self.append_all(std::slice::from_ref(entry))
    }

    /// Append several entries with a single open.
    pub fn append_all(&self, entries: &[HistoryEntry]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        for entry in entries {
            let json = serde_json::to_string(entry)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            writeln!(file, "{json}")?;
        }
        file.flush()
    }

    /// Read every well-formed entry, oldest first.
    pub fn read_all(&self) -> io::Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut entries = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(line = lineno + 1, error = %e, "skipping malformed history line"),
            }
        }
        Ok(entries)
    }

    /// Entries for one run id, oldest first.
    pub fn find(&self, run_id: &str) -> io::Result<Vec<HistoryEntry>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.run_id == run_id)
            .collect())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
