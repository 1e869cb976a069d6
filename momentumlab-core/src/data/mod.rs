//! Price data: sources, fallback chain, Parquet cache, alignment.

pub mod align;
pub mod cache;
pub mod chain;
pub mod circuit_breaker;
pub mod financial_datasets;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use align::{align_closes, align_ragged, forward_fill};
pub use cache::{cache_key, CacheMeta, CacheSource, PriceCache};
pub use chain::{ChainFetch, SourceChain};
pub use circuit_breaker::CircuitBreaker;
pub use financial_datasets::FinancialDatasetsSource;
pub use provider::{DailyClose, DataError, PriceSource, SourceKind};
pub use synthetic::SyntheticSource;
pub use yahoo::YahooSource;
