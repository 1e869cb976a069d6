//! Ticker universes: static lists, TOML files, and the Finviz screener.
//!
//! A universe is an ordered, de-duplicated ticker list. Order matters: it is
//! the ranker's tie-break order.

pub mod finviz;

pub use finviz::{FinvizScreener, ScreenerQuery};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Default universe when no screener or file is configured.
pub const DEFAULT_TICKERS: [&str; 7] = ["NVDA", "AAPL", "MSFT", "TSLA", "AMD", "META", "GOOGL"];

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("screener token not set ({0})")]
    MissingToken(&'static str),

    #[error("screener request failed: {0}")]
    Http(String),

    #[error("screener CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("screener CSV has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("universe is empty")]
    Empty,
}

/// Anything that can produce an ordered ticker list.
pub trait UniverseSource {
    fn name(&self) -> &str;
    fn tickers(&self) -> Result<Vec<String>, UniverseError>;
}

/// A fixed, in-memory list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticUniverse {
    tickers: Vec<String>,
}

impl StaticUniverse {
    pub fn new<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tickers: normalize(tickers.into_iter().map(Into::into)),
        }
    }
}

impl Default for StaticUniverse {
    fn default() -> Self {
        Self::new(DEFAULT_TICKERS)
    }
}

impl UniverseSource for StaticUniverse {
    fn name(&self) -> &str {
        "static"
    }

    fn tickers(&self) -> Result<Vec<String>, UniverseError> {
        if self.tickers.is_empty() {
            return Err(UniverseError::Empty);
        }
        Ok(self.tickers.clone())
    }
}

/// TOML universe file: `tickers = ["AAPL", "MSFT"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseFile {
    pub tickers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UniverseFile {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        Ok(toml::from_str(content)?)
    }
}

impl UniverseSource for UniverseFile {
    fn name(&self) -> &str {
        "file"
    }

    fn tickers(&self) -> Result<Vec<String>, UniverseError> {
        let tickers = normalize(self.tickers.iter().cloned());
        if tickers.is_empty() {
            return Err(UniverseError::Empty);
        }
        Ok(tickers)
    }
}

/// A resolved universe and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredUniverse {
    pub tickers: Vec<String>,
    pub source: String,
}

/// Try `primary`, fall back to `fallback` on any error or an empty list.
pub fn discover_universe(
    primary: &dyn UniverseSource,
    fallback: &dyn UniverseSource,
) -> Result<DiscoveredUniverse, UniverseError> {
    match primary.tickers() {
        Ok(tickers) if !tickers.is_empty() => {
            info!(source = primary.name(), count = tickers.len(), "universe discovered");
            return Ok(DiscoveredUniverse {
                tickers,
                source: primary.name().to_string(),
            });
        }
        Ok(_) => warn!(source = primary.name(), "universe source returned no tickers, falling back"),
        Err(e) => warn!(source = primary.name(), error = %e, "universe source failed, falling back"),
    }
    let tickers = fallback.tickers()?;
    info!(source = fallback.name(), count = tickers.len(), "using fallback universe");
    Ok(DiscoveredUniverse {
        tickers,
        source: fallback.name().to_string(),
    })
}

/// Trim, upper-case, drop blanks and repeats; first occurrence keeps its place.
pub fn normalize(tickers: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ticker in tickers {
        let t = ticker.trim().to_ascii_uppercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}
