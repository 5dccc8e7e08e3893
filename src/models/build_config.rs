use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DEFAULT_DELAY_SECS, DEFAULT_MAX_SYMBOLS, FLUSH_EVERY, STORE_FILE};
use crate::utils::get_data_dir;

/// Configuration for a batch build run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Durable store file the run loads from and appends to.
    pub store_path: PathBuf,

    /// Mandatory delay between symbol fetches. This keeps the run
    /// under the provider's abuse thresholds; it is not a tunable
    /// performance knob.
    pub delay: Duration,

    /// Flush the buffer to disk every N accumulated records.
    pub flush_every: usize,

    /// Stop cleanly after this many symbols, leaving the rest for the
    /// next run to resume.
    pub max_symbols: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            store_path: get_data_dir().join(STORE_FILE),
            delay: Duration::from_secs(DEFAULT_DELAY_SECS),
            flush_every: FLUSH_EVERY,
            max_symbols: DEFAULT_MAX_SYMBOLS,
        }
    }
}

/// Outcome counters for one batch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildStats {
    /// Records computed and handed to the store.
    pub added: usize,

    /// Symbols skipped: fetch failure or empty history.
    pub skipped: usize,

    /// Symbols left untouched because the run budget was exhausted.
    pub remaining: usize,

    /// Number of store flushes (periodic + final).
    pub flushes: usize,
}

impl BuildStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_processed(&self) -> usize {
        self.added + self.skipped
    }
}
