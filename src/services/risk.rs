//! Pure risk metric calculator.
//!
//! Turns a price history plus a fundamental snapshot into the five
//! descriptive metrics of the output table. No I/O, no panics on
//! degenerate input: a metric that cannot be computed (too few bars,
//! missing attribute) comes back as None and never blocks the others.
//!
//! The z-score reference constants and factor weights are an output
//! compatibility contract, see `constants.rs`.

use crate::constants::{
    FACTOR_WEIGHT_BETA, FACTOR_WEIGHT_DEBT_TO_EQUITY, FACTOR_WEIGHT_PRICE_TO_BOOK,
    FACTOR_WEIGHT_RETURN_ON_ASSETS, PE_FALLBACK, RISK_REFERENCE_HIGH, RISK_REFERENCE_LOW,
    VAR_PERCENTILE,
};
use crate::models::{FundamentalSnapshot, PriceHistory};

/// Computed metrics for one symbol. Each field is independently
/// nullable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskMetrics {
    /// Std dev of daily returns over the window, percent.
    pub volatility: Option<f64>,
    /// Peak-to-trough decline of the cumulative return index, percent,
    /// always <= 0.
    pub drawdown: Option<f64>,
    /// Composite 0-100 score from volatility, |drawdown| and P/E.
    /// Higher = less risky.
    pub z_score_risk: Option<i64>,
    /// 0-100 score from the empirical 5th-percentile daily return.
    pub var_risk: Option<f64>,
    /// 0-100 score from hand-weighted fundamental ratios.
    pub factor_score: Option<f64>,
}

/// Compute all metrics for one symbol.
pub fn compute_metrics(history: &PriceHistory, fundamentals: &FundamentalSnapshot) -> RiskMetrics {
    let returns = history.daily_returns();

    let volatility = volatility(&returns);
    let drawdown = max_drawdown(history);

    // Composite policy: null when either price-derived input is null.
    // A missing P/E alone never nulls it (fixed fallback instead).
    let z_score_risk = match (volatility, drawdown) {
        (Some(vol), Some(dd)) => {
            let pe = fundamentals.get("trailingPE").unwrap_or(PE_FALLBACK);
            Some(z_score_risk(vol, dd.abs(), pe))
        }
        _ => None,
    };

    RiskMetrics {
        volatility,
        drawdown,
        z_score_risk,
        var_risk: var_risk(&returns),
        factor_score: Some(factor_score(fundamentals)),
    }
}

/// Population standard deviation of daily returns, as a percentage.
/// None for histories with fewer than 2 bars.
pub fn volatility(returns: &[f64]) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt() * 100.0)
}

/// Maximum drawdown of the cumulative return index, as a percentage.
/// Always <= 0. None for an empty history; a single bar yields 0.
pub fn max_drawdown(history: &PriceHistory) -> Option<f64> {
    if history.is_empty() {
        return None;
    }

    // Cumulative index is the running product of (1 + return), with
    // the first bar's undefined return counted as 0.
    let mut cumulative = 1.0_f64;
    let mut running_max = 1.0_f64;
    let mut worst = 0.0_f64;

    for r in history.daily_returns() {
        cumulative *= 1.0 + r;
        running_max = running_max.max(cumulative);
        worst = worst.min(cumulative / running_max - 1.0);
    }

    Some(worst * 100.0)
}

/// Composite risk score: each input standardized against the fixed
/// two-point reference distribution, summed, scaled to 0-100, then
/// inverted so higher = less risky.
pub fn z_score_risk(volatility_pct: f64, drawdown_abs_pct: f64, pe_ratio: f64) -> i64 {
    let inputs = [volatility_pct, drawdown_abs_pct, pe_ratio];

    let mut sum_z = 0.0;
    for i in 0..3 {
        let low = RISK_REFERENCE_LOW[i];
        let high = RISK_REFERENCE_HIGH[i];
        // Mean and population std dev of exactly the two reference
        // points.
        let mean = (low + high) / 2.0;
        let std = (high - low) / 2.0;
        sum_z += (inputs[i] - mean) / std;
    }

    let score = 100.0 - (sum_z * 10.0 + 50.0).clamp(0.0, 100.0);
    score.round() as i64
}

/// VaR-based score: 5th percentile of daily returns (percent), shifted
/// and clamped into 0-100. None for fewer than 2 bars.
pub fn var_risk(returns: &[f64]) -> Option<f64> {
    let p5 = percentile(returns, VAR_PERCENTILE)? * 100.0;
    Some((100.0 + p5).clamp(0.0, 100.0))
}

/// Weighted linear combination of fundamental ratios. Attributes that
/// are absent or non-finite contribute 0.
pub fn factor_score(fundamentals: &FundamentalSnapshot) -> f64 {
    let weighted = [
        ("beta", FACTOR_WEIGHT_BETA),
        ("priceToBook", FACTOR_WEIGHT_PRICE_TO_BOOK),
        ("returnOnAssets", FACTOR_WEIGHT_RETURN_ON_ASSETS),
        ("debtToEquity", FACTOR_WEIGHT_DEBT_TO_EQUITY),
    ];

    let raw: f64 = weighted
        .iter()
        .filter_map(|(name, weight)| fundamentals.get(name).map(|v| v * weight))
        .sum();

    100.0 - raw.clamp(0.0, 100.0)
}

/// Linear-interpolation percentile of an unsorted sample.
/// `p` in [0, 1]. None for an empty sample.
fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = rank - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceBar;
    use chrono::NaiveDate;

    fn history(closes: &[f64]) -> PriceHistory {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                close,
            })
            .collect();
        PriceHistory::new(bars)
    }

    #[test]
    fn test_flat_series_has_zero_vol_and_drawdown() {
        let h = history(&[50.0, 50.0, 50.0, 50.0]);
        let m = compute_metrics(&h, &FundamentalSnapshot::default());
        assert_eq!(m.volatility, Some(0.0));
        assert_eq!(m.drawdown, Some(0.0));
    }

    #[test]
    fn test_monotonic_rise_has_zero_drawdown_and_full_var_score() {
        let h = history(&[100.0, 101.0, 103.0, 106.0, 110.0]);
        let m = compute_metrics(&h, &FundamentalSnapshot::default());
        assert_eq!(m.drawdown, Some(0.0));
        // All returns positive, so the 5th-percentile return is >= 0
        // and the score clamps at 100.
        assert_eq!(m.var_risk, Some(100.0));
    }

    #[test]
    fn test_empty_history_nulls_price_metrics() {
        let m = compute_metrics(&PriceHistory::default(), &FundamentalSnapshot::default());
        assert_eq!(m.volatility, None);
        assert_eq!(m.drawdown, None);
        assert_eq!(m.var_risk, None);
        // Composite needs both price-derived inputs, so it is null too.
        assert_eq!(m.z_score_risk, None);
        // Factor score still resolves with zero contributions.
        assert_eq!(m.factor_score, Some(100.0));
    }

    #[test]
    fn test_single_bar_degrades_without_panicking() {
        let m = compute_metrics(&history(&[42.0]), &FundamentalSnapshot::default());
        assert_eq!(m.volatility, None);
        assert_eq!(m.drawdown, Some(0.0));
        assert_eq!(m.var_risk, None);
        assert_eq!(m.z_score_risk, None);
    }

    #[test]
    fn test_drawdown_matches_peak_to_trough() {
        // 100 -> 120 (peak) -> 90 (trough): drawdown = 90/120 - 1 = -25%
        let h = history(&[100.0, 120.0, 90.0, 95.0]);
        let dd = max_drawdown(&h).unwrap();
        assert!((dd - (-25.0)).abs() < 1e-9);
    }

    #[test]
    fn test_reference_vector_fixture() {
        // Exactly the low-risk reference point: every z is -1, so
        // sum_z*10 + 50 = 20 and the inverted score is 80.
        assert_eq!(z_score_risk(15.0, 20.0, 25.0), 80);
        // The high-risk reference point mirrors it.
        assert_eq!(z_score_risk(35.0, 60.0, 80.0), 20);
    }

    #[test]
    fn test_composite_non_increasing_in_risk_inputs() {
        let base = z_score_risk(20.0, 30.0, 25.0);
        assert!(z_score_risk(25.0, 30.0, 25.0) <= base);
        assert!(z_score_risk(20.0, 40.0, 25.0) <= base);
    }

    #[test]
    fn test_composite_clamps_to_bounds() {
        assert_eq!(z_score_risk(500.0, 500.0, 500.0), 0);
        assert_eq!(z_score_risk(-500.0, 0.0, 0.0), 100);
    }

    #[test]
    fn test_pe_fallback_applies_when_absent() {
        let h = history(&[100.0, 100.0, 100.0]);
        let with_default = compute_metrics(&h, &FundamentalSnapshot::default());
        let with_explicit = compute_metrics(
            &h,
            &FundamentalSnapshot {
                trailing_pe: Some(PE_FALLBACK),
                ..Default::default()
            },
        );
        assert_eq!(with_default.z_score_risk, with_explicit.z_score_risk);

        // A NaN P/E falls back the same way.
        let with_nan = compute_metrics(
            &h,
            &FundamentalSnapshot {
                trailing_pe: Some(f64::NAN),
                ..Default::default()
            },
        );
        assert_eq!(with_default.z_score_risk, with_nan.z_score_risk);
    }

    #[test]
    fn test_factor_score_sums_present_attributes() {
        let f = FundamentalSnapshot {
            beta: Some(1.0),
            price_to_book: Some(5.0),
            return_on_assets: Some(10.0),
            debt_to_equity: Some(50.0),
            ..Default::default()
        };
        // 1.0*0.3 + 5.0*0.2 - 10.0*0.2 + 50.0*0.3 = 14.3
        let score = factor_score(&f);
        assert!((score - 85.7).abs() < 1e-9);
    }

    #[test]
    fn test_factor_score_ignores_absent_and_nan() {
        let f = FundamentalSnapshot {
            beta: Some(2.0),
            debt_to_equity: Some(f64::NAN),
            ..Default::default()
        };
        // Only beta contributes: 100 - 0.6
        assert!((factor_score(&f) - 99.4).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let v = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(percentile(&v, 0.0), Some(10.0));
        assert_eq!(percentile(&v, 1.0), Some(50.0));
        assert_eq!(percentile(&v, 0.5), Some(30.0));
        // rank = 0.05 * 4 = 0.2 -> 10 + 0.2*(20-10) = 12
        assert_eq!(percentile(&v, 0.05), Some(12.0));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_volatility_population_std() {
        // Returns +10%, -10%: mean 0, population std 0.1 -> 10%.
        let vol = volatility(&[0.10, -0.10]).unwrap();
        assert!((vol - 10.0).abs() < 1e-9);
    }
}
