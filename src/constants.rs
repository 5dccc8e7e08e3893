//! Scoring and CSV format constants.
//!
//! The z-score reference vectors and factor weights are part of the
//! output contract: scores produced by different runs (and by the
//! `score` command) must agree, so they live here rather than in config.

/// Low-risk reference point for (volatility %, |drawdown| %, P/E).
pub const RISK_REFERENCE_LOW: [f64; 3] = [15.0, 20.0, 25.0];

/// High-risk reference point for (volatility %, |drawdown| %, P/E).
pub const RISK_REFERENCE_HIGH: [f64; 3] = [35.0, 60.0, 80.0];

/// Fallback P/E ratio when the provider has no trailing P/E.
pub const PE_FALLBACK: f64 = 25.0;

/// Percentile used for the historical VaR proxy (5th percentile of
/// daily returns, linear interpolation).
pub const VAR_PERCENTILE: f64 = 0.05;

/// Factor score weights, applied to attributes that are present and
/// finite. Absent attributes contribute zero.
pub const FACTOR_WEIGHT_BETA: f64 = 0.3;
pub const FACTOR_WEIGHT_PRICE_TO_BOOK: f64 = 0.2;
pub const FACTOR_WEIGHT_RETURN_ON_ASSETS: f64 = -0.2;
pub const FACTOR_WEIGHT_DEBT_TO_EQUITY: f64 = 0.3;

/// Fundamental attribute columns appended after the metric columns,
/// in CSV order. Keys match the provider's attribute names.
pub const FUNDAMENTAL_COLUMNS: &[&str] = &[
    "beta",
    "dividendYield",
    "revenueGrowth",
    "priceToBook",
    "returnOnAssets",
    "returnOnEquity",
    "marketCap",
    "shortRatio",
];

/// Metric columns of the risk store CSV, before the fundamentals.
pub const METRIC_COLUMNS: &[&str] = &[
    "Ticker",
    "Z-Score Risk",
    "Volatility",
    "Drawdown",
    "VaR Risk",
    "Factor-Based",
    "Date",
];

/// Default delay between symbol fetches in the batch builder.
/// Required to stay under the provider's abuse thresholds; lowering it
/// risks losing access for every subsequent run.
pub const DEFAULT_DELAY_SECS: u64 = 60;

/// Delay used by the interactive `score` command (few symbols only).
pub const INTERACTIVE_DELAY_MS: u64 = 200;

/// Flush the in-memory batch buffer to disk every N new records.
/// Bounds data loss on interruption to at most N - 1 rows.
pub const FLUSH_EVERY: usize = 10;

/// Maximum symbols processed per batch run before a clean stop.
pub const DEFAULT_MAX_SYMBOLS: usize = 100;

/// Trailing lookback window for price history, in calendar days.
pub const LOOKBACK_DAYS: i64 = 365;

/// Time-to-live for cached per-symbol quote data, in seconds.
pub const QUOTE_CACHE_TTL_SECS: u64 = 86_400;

/// Requests allowed per minute against the market data provider.
pub const RATE_LIMIT_PER_MINUTE: u32 = 60;

/// Default durable store file name inside the data directory.
pub const STORE_FILE: &str = "sp500_risk_scores.csv";

/// Append-only log of per-symbol fetch failures.
pub const SKIP_LOG_FILE: &str = "fetch_errors.log";

/// Default public constituents table (CSV, first header column "Symbol").
pub const DEFAULT_UNIVERSE_URL: &str =
    "https://datahub.io/core/s-and-p-500-companies/r/constituents.csv";
