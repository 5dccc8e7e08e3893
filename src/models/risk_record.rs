use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::FundamentalSnapshot;
use crate::services::risk::RiskMetrics;

/// One output row of the risk store: the computed scores plus the
/// fundamental snapshot for a symbol on a given run date.
///
/// Records are immutable once written. A later run appends a new
/// record for the same symbol with its own date; the store collapses
/// only exact (ticker, date) duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub ticker: String,
    /// Composite z-score risk, 0-100, higher = less risky.
    pub z_score_risk: Option<i64>,
    /// Std dev of daily returns, percent, rounded to 2 decimals.
    pub volatility: Option<f64>,
    /// Max drawdown, percent, always <= 0, rounded to 2 decimals.
    pub drawdown: Option<f64>,
    /// Historical-VaR-based score, 0-100, higher = less risky.
    pub var_risk: Option<f64>,
    /// Weighted factor score, 0-100, higher = less risky.
    pub factor_score: Option<f64>,
    pub date: NaiveDate,
    pub fundamentals: FundamentalSnapshot,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl RiskRecord {
    /// Build a record from computed metrics, applying the output
    /// rounding (2 decimals for percent metrics, integer composite).
    pub fn new(
        ticker: &str,
        metrics: &RiskMetrics,
        fundamentals: FundamentalSnapshot,
        date: NaiveDate,
    ) -> Self {
        Self {
            ticker: ticker.to_string(),
            z_score_risk: metrics.z_score_risk,
            volatility: metrics.volatility.map(round2),
            drawdown: metrics.drawdown.map(round2),
            var_risk: metrics.var_risk.map(round2),
            factor_score: metrics.factor_score.map(round2),
            date,
            fundamentals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rounds_metrics() {
        let metrics = RiskMetrics {
            volatility: Some(1.23456),
            drawdown: Some(-4.56789),
            z_score_risk: Some(80),
            var_risk: Some(97.4999),
            factor_score: Some(99.125),
        };
        let record = RiskRecord::new(
            "AAPL",
            &metrics,
            FundamentalSnapshot::default(),
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        );
        assert_eq!(record.volatility, Some(1.23));
        assert_eq!(record.drawdown, Some(-4.57));
        assert_eq!(record.var_risk, Some(97.5));
        assert_eq!(record.factor_score, Some(99.13));
        assert_eq!(record.z_score_risk, Some(80));
    }
}
