//! Domain types for MomentumLab

pub mod price_table;
pub mod score;
pub mod trade;

pub use price_table::{PriceTable, PriceTableError};
pub use score::TrendScore;
pub use trade::{Position, Trade};
