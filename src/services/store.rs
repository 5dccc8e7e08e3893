//! Durable risk score store.
//!
//! A single CSV file, loaded fully into memory at the start of a run
//! and rewritten in full on every flush. The rewrite goes to a
//! temporary file first and is renamed into place, so an interrupted
//! flush never corrupts the previous durable copy.
//!
//! Append upserts by (ticker, date): re-running the builder on the
//! same day replaces that day's rows instead of duplicating them,
//! while a run on a later date appends a new snapshot row.

use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::{FUNDAMENTAL_COLUMNS, METRIC_COLUMNS};
use crate::error::{AppError, Result};
use crate::models::{FundamentalSnapshot, RiskRecord};

pub struct RiskStore {
    path: PathBuf,
    records: Vec<RiskRecord>,
    tickers: HashSet<String>,
}

impl RiskStore {
    /// Load the store from disk. A missing file is an empty store,
    /// not an error.
    pub fn load(path: &Path) -> Result<Self> {
        let mut store = Self {
            path: path.to_path_buf(),
            records: Vec::new(),
            tickers: HashSet::new(),
        };

        if !path.exists() {
            debug!(path = %path.display(), "no existing store, starting empty");
            return Ok(store);
        }

        let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;

        let headers = reader.headers()?.clone();
        if headers.get(0) != Some("Ticker") {
            return Err(AppError::Store(format!(
                "unexpected store header in {}: first column is {:?}, expected \"Ticker\"",
                path.display(),
                headers.get(0)
            )));
        }

        for result in reader.records() {
            let record = result?;
            match parse_row(&record) {
                Some(row) => {
                    store.tickers.insert(row.ticker.clone());
                    store.records.push(row);
                }
                None => {
                    warn!(line = ?record.position().map(|p| p.line()), "skipping malformed store row");
                }
            }
        }

        debug!(rows = store.records.len(), "loaded risk store");
        Ok(store)
    }

    /// True if at least one row exists for the ticker. Used by the
    /// builder to skip already-processed symbols on resume.
    pub fn contains(&self, ticker: &str) -> bool {
        self.tickers.contains(ticker)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[RiskRecord] {
        &self.records
    }

    /// Append rows and flush the full store to disk. Rows that match
    /// an existing (ticker, date) pair replace the old row.
    ///
    /// A write failure here is fatal to the run: the caller must not
    /// continue fetching against a store it cannot persist.
    pub fn append(&mut self, rows: Vec<RiskRecord>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        for row in rows {
            if let Some(existing) = self
                .records
                .iter_mut()
                .find(|r| r.ticker == row.ticker && r.date == row.date)
            {
                *existing = row;
            } else {
                self.tickers.insert(row.ticker.clone());
                self.records.push(row);
            }
        }

        self.flush()
    }

    /// Rewrite the durable file atomically: write to `<path>.tmp`,
    /// then rename over the previous copy.
    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| AppError::Store(format!("create {}: {}", parent.display(), e)))?;
            }
        }

        let tmp_path = self.path.with_extension("csv.tmp");

        let mut writer = WriterBuilder::new()
            .from_path(&tmp_path)
            .map_err(|e| AppError::Store(format!("open {}: {}", tmp_path.display(), e)))?;

        let header: Vec<&str> = METRIC_COLUMNS
            .iter()
            .chain(FUNDAMENTAL_COLUMNS.iter())
            .copied()
            .collect();
        writer
            .write_record(&header)
            .map_err(|e| AppError::Store(e.to_string()))?;

        for record in &self.records {
            writer
                .write_record(&format_row(record))
                .map_err(|e| AppError::Store(e.to_string()))?;
        }

        writer
            .flush()
            .map_err(|e| AppError::Store(e.to_string()))?;
        drop(writer);

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            AppError::Store(format!(
                "rename {} -> {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        debug!(rows = self.records.len(), path = %self.path.display(), "flushed risk store");
        Ok(())
    }
}

fn fmt_opt_f64(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn fmt_opt_i64(v: Option<i64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// CSV fields for one record, in header order. Missing values are
/// empty, never zero.
fn format_row(record: &RiskRecord) -> Vec<String> {
    let mut fields = vec![
        record.ticker.clone(),
        fmt_opt_i64(record.z_score_risk),
        fmt_opt_f64(record.volatility),
        fmt_opt_f64(record.drawdown),
        fmt_opt_f64(record.var_risk),
        fmt_opt_f64(record.factor_score),
        record.date.format("%Y-%m-%d").to_string(),
    ];
    for column in FUNDAMENTAL_COLUMNS {
        fields.push(fmt_opt_f64(record.fundamentals.get(column)));
    }
    fields
}

fn parse_opt_f64(field: Option<&str>) -> Option<f64> {
    field.and_then(|s| s.trim().parse().ok())
}

fn parse_row(record: &csv::StringRecord) -> Option<RiskRecord> {
    let ticker = record.get(0)?.trim();
    if ticker.is_empty() {
        return None;
    }
    let date = NaiveDate::parse_from_str(record.get(6)?.trim(), "%Y-%m-%d").ok()?;

    let fundamentals = FundamentalSnapshot {
        beta: parse_opt_f64(record.get(7)),
        dividend_yield: parse_opt_f64(record.get(8)),
        revenue_growth: parse_opt_f64(record.get(9)),
        price_to_book: parse_opt_f64(record.get(10)),
        return_on_assets: parse_opt_f64(record.get(11)),
        return_on_equity: parse_opt_f64(record.get(12)),
        market_cap: parse_opt_f64(record.get(13)),
        short_ratio: parse_opt_f64(record.get(14)),
        ..Default::default()
    };

    Some(RiskRecord {
        ticker: ticker.to_string(),
        z_score_risk: record.get(1).and_then(|s| s.trim().parse().ok()),
        volatility: parse_opt_f64(record.get(2)),
        drawdown: parse_opt_f64(record.get(3)),
        var_risk: parse_opt_f64(record.get(4)),
        factor_score: parse_opt_f64(record.get(5)),
        date,
        fundamentals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(ticker: &str, date: (i32, u32, u32), z: i64) -> RiskRecord {
        RiskRecord {
            ticker: ticker.to_string(),
            z_score_risk: Some(z),
            volatility: Some(1.23),
            drawdown: Some(-4.56),
            var_risk: Some(97.5),
            factor_score: Some(85.7),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            fundamentals: FundamentalSnapshot {
                beta: Some(1.1),
                market_cap: Some(2.5e12),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let store = RiskStore::load(&dir.path().join("scores.csv")).unwrap();
        assert!(store.is_empty());
        assert!(!store.contains("AAPL"));
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.csv");

        let mut store = RiskStore::load(&path).unwrap();
        let rows = vec![
            record("AAPL", (2025, 6, 2), 80),
            record("MSFT", (2025, 6, 2), 74),
        ];
        store.append(rows.clone()).unwrap();

        let reloaded = RiskStore::load(&path).unwrap();
        assert_eq!(reloaded.records(), rows.as_slice());
        assert!(reloaded.contains("AAPL"));
        assert!(reloaded.contains("MSFT"));
        assert!(!reloaded.contains("GOOG"));
    }

    #[test]
    fn test_missing_values_serialize_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.csv");

        let mut store = RiskStore::load(&path).unwrap();
        let mut row = record("XYZ", (2025, 6, 2), 0);
        row.z_score_risk = None;
        row.volatility = None;
        store.append(vec![row.clone()]).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let data_line = contents.lines().nth(1).unwrap();
        assert!(data_line.starts_with("XYZ,,,"));

        let reloaded = RiskStore::load(&path).unwrap();
        assert_eq!(reloaded.records()[0].z_score_risk, None);
        assert_eq!(reloaded.records()[0].volatility, None);
        assert_eq!(reloaded.records()[0].drawdown, Some(-4.56));
    }

    #[test]
    fn test_append_upserts_same_ticker_and_date() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.csv");

        let mut store = RiskStore::load(&path).unwrap();
        store.append(vec![record("AAPL", (2025, 6, 2), 80)]).unwrap();
        store.append(vec![record("AAPL", (2025, 6, 2), 75)]).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.records()[0].z_score_risk, Some(75));

        // A later run date appends a second snapshot row.
        store.append(vec![record("AAPL", (2025, 6, 3), 70)]).unwrap();
        assert_eq!(store.len(), 2);

        let reloaded = RiskStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_flush_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.csv");

        let mut store = RiskStore::load(&path).unwrap();
        store.append(vec![record("AAPL", (2025, 6, 2), 80)]).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn test_load_rejects_foreign_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        fs::write(&path, "symbol,price\nAAPL,1.0\n").unwrap();

        assert!(matches!(
            RiskStore::load(&path),
            Err(AppError::Store(_))
        ));
    }
}
