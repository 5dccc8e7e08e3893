//! Incremental batch builder.
//!
//! Drives the pipeline: load the durable store, diff against the
//! constituent universe, then walk the remaining symbols one at a
//! time with a mandatory inter-request delay. Per-symbol failures
//! are skipped and logged; the buffer is flushed to the store every
//! few records so an interrupted run loses almost nothing and the
//! next run resumes where this one stopped.

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::models::{BuildConfig, BuildStats, RiskRecord};
use crate::services::risk::compute_metrics;
use crate::services::store::RiskStore;
use crate::services::yahoo::QuoteProvider;

/// Append-only log of per-symbol failures, for post-hoc debugging.
/// Never read programmatically; a write failure only warns.
pub struct SkipLog {
    path: PathBuf,
}

impl SkipLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn record(&self, symbol: &str, message: &str) {
        let line = format!(
            "{} - {}: {}\n",
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            symbol,
            message
        );
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = result {
            warn!(path = %self.path.display(), "could not write skip log: {}", e);
        }
    }
}

pub struct BatchBuilder<P: QuoteProvider> {
    provider: P,
    store: RiskStore,
    config: BuildConfig,
    skip_log: SkipLog,
    cancel: Arc<AtomicBool>,
}

impl<P: QuoteProvider> BatchBuilder<P> {
    pub fn new(provider: P, store: RiskStore, config: BuildConfig, skip_log: SkipLog) -> Self {
        Self {
            provider,
            store,
            config,
            skip_log,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Token for external cancellation. Checked at the top of each
    /// symbol iteration; buffered records are flushed before exit.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run one batch pass over the universe. Stops cleanly when the
    /// symbol budget is exhausted or cancellation is requested; both
    /// are normal terminations, not failures.
    pub async fn run(&mut self, universe: &[String]) -> Result<BuildStats> {
        let remaining = self.remaining_symbols(universe);
        info!(
            universe = universe.len(),
            already_stored = universe.len() - remaining.len(),
            remaining = remaining.len(),
            "starting batch run"
        );

        let planned = remaining.len().min(self.config.max_symbols);
        let pb = ProgressBar::new(planned as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        let mut stats = BuildStats::new();
        let mut buffer: Vec<RiskRecord> = Vec::new();
        let run_date = Utc::now().date_naive();

        for (processed, symbol) in remaining.iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                info!("cancellation requested, stopping after {} symbols", processed);
                break;
            }
            if processed >= self.config.max_symbols {
                info!(
                    budget = self.config.max_symbols,
                    "run budget exhausted, stopping cleanly"
                );
                break;
            }

            pb.set_message(symbol.clone());

            match self.provider.fetch_quote(symbol).await {
                Ok(quote) if quote.history.is_empty() => {
                    // Valid outcome for delisted or renamed symbols.
                    stats.skipped += 1;
                    self.skip_log.record(symbol, "no price data");
                    warn!(symbol = %symbol, "skipped: no price data");
                }
                Ok(quote) => {
                    let metrics = compute_metrics(&quote.history, &quote.fundamentals);
                    buffer.push(RiskRecord::new(symbol, &metrics, quote.fundamentals, run_date));
                    stats.added += 1;
                }
                Err(e) => {
                    // Per-symbol failures never abort the batch. The
                    // skip log line already names the symbol, so for
                    // fetch errors only the cause is recorded.
                    stats.skipped += 1;
                    let reason = match &e {
                        AppError::Fetch { cause, .. } => cause.clone(),
                        other => other.to_string(),
                    };
                    self.skip_log.record(symbol, &reason);
                    warn!(symbol = %symbol, "skipped: {}", reason);
                }
            }

            if buffer.len() >= self.config.flush_every {
                self.flush(&mut buffer, &mut stats)?;
            }

            pb.inc(1);

            // Mandatory throttle between provider requests. Skipping
            // it gets the whole pipeline rate-limited or banned.
            let more_to_go =
                processed + 1 < remaining.len() && processed + 1 < self.config.max_symbols;
            if more_to_go && !self.cancel.load(Ordering::Relaxed) {
                sleep(self.config.delay).await;
            }
        }

        if !buffer.is_empty() {
            self.flush(&mut buffer, &mut stats)?;
        }

        stats.remaining = remaining.len() - stats.total_processed();
        pb.finish_with_message("done");

        println!(
            "✅ Batch complete: {} added, {} skipped, {} remaining for next run",
            stats.added, stats.skipped, stats.remaining
        );
        if stats.skipped > 0 {
            println!("   Skips logged to the fetch error log");
        }

        Ok(stats)
    }

    /// Universe order minus symbols already in the store, first
    /// occurrence wins for duplicate universe entries.
    fn remaining_symbols(&self, universe: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        universe
            .iter()
            .filter(|s| seen.insert(s.as_str()))
            .filter(|s| !self.store.contains(s.as_str()))
            .cloned()
            .collect()
    }

    /// Hand the buffer to the store. A write failure is fatal: the
    /// run must not keep fetching against a store it cannot persist.
    fn flush(&mut self, buffer: &mut Vec<RiskRecord>, stats: &mut BuildStats) -> Result<()> {
        let rows = std::mem::take(buffer);
        let count = rows.len();
        self.store.append(rows).map_err(|e| {
            AppError::Store(format!("flush of {} buffered rows failed: {}", count, e))
        })?;
        stats.flushes += 1;
        Ok(())
    }
}
