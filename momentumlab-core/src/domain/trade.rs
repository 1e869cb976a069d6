//! Position and Trade: a closed round trip plus the score that opened it.

use super::score::TrendScore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single all-capital position, recorded once it has both legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,

    // ── Entry ──
    pub entry_index: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_index: usize,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
}

impl Position {
    /// Simple return of the round trip: `exit / entry - 1`.
    pub fn roi(&self) -> f64 {
        self.exit_price / self.entry_price - 1.0
    }

    pub fn bars_held(&self) -> usize {
        self.exit_index - self.entry_index
    }
}

/// A closed position and the trend score that triggered it.
///
/// Created exactly once by the simulator and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub position: Position,
    pub score: TrendScore,
}

impl Trade {
    pub fn ticker(&self) -> &str {
        &self.position.ticker
    }

    pub fn roi(&self) -> f64 {
        self.position.roi()
    }

    pub fn is_winner(&self) -> bool {
        self.roi() > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade() -> Trade {
        Trade {
            position: Position {
                ticker: "NVDA".into(),
                entry_index: 20,
                entry_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                entry_price: 120.0,
                exit_index: 30,
                exit_date: NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
                exit_price: 132.0,
            },
            score: TrendScore::new(0.01, 0.9),
        }
    }

    #[test]
    fn roi_calculation() {
        let trade = sample_trade();
        assert!((trade.roi() - 0.1).abs() < 1e-12);
        assert!(trade.is_winner());
        assert_eq!(trade.position.bars_held(), 10);
    }

    #[test]
    fn trade_serialization_roundtrip() {
        let trade = sample_trade();
        let json = serde_json::to_string(&trade).unwrap();
        let deser: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, deser);
    }
}
