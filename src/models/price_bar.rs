use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily price history for one symbol, ordered by date ascending.
///
/// May be empty: a symbol the provider has no data for (delisted,
/// renamed, bad ticker) is a valid empty history, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub bars: Vec<PriceBar>,
}

impl PriceHistory {
    pub fn new(mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Self { bars }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Daily simple returns: close[t] / close[t-1] - 1.
    ///
    /// The first bar has no prior close, so the result has len() - 1
    /// entries. Empty for histories with fewer than 2 bars.
    pub fn daily_returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .filter(|w| w[0].close != 0.0)
            .map(|w| w[1].close / w[0].close - 1.0)
            .collect()
    }
}
