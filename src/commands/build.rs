use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::constants::SKIP_LOG_FILE;
use crate::error::Error;
use crate::models::BuildConfig;
use crate::services::{BatchBuilder, RiskStore, SkipLog, UniverseClient, YahooClient};
use crate::utils::get_data_dir;

pub fn run(
    delay_secs: u64,
    max_symbols: usize,
    output: Option<PathBuf>,
    universe_url: Option<String>,
) {
    let mut config = BuildConfig::default();
    config.delay = Duration::from_secs(delay_secs);
    config.max_symbols = max_symbols;
    if let Some(path) = output {
        config.store_path = path;
    }

    println!("📥 Incremental risk score build");
    println!("   Store: {}", config.store_path.display());
    println!(
        "   Delay: {}s between symbols, budget: {} symbols",
        config.delay.as_secs(),
        config.max_symbols
    );

    match run_build(config, universe_url) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("\n❌ Build failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_build(config: BuildConfig, universe_url: Option<String>) -> Result<(), Error> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Config(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        // Universe failure is fatal: with no symbol list there is
        // nothing to iterate.
        let universe = UniverseClient::new(universe_url)?.fetch().await?;

        let store = RiskStore::load(&config.store_path)?;
        let skip_log = SkipLog::new(&get_data_dir().join(SKIP_LOG_FILE));
        let provider = YahooClient::new()?;

        let mut builder = BatchBuilder::new(provider, store, config, skip_log);

        // Ctrl-C requests a clean stop; the builder flushes buffered
        // rows before returning.
        let cancel = builder.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n⚠️  Interrupt received, finishing current symbol then flushing...");
                cancel.store(true, Ordering::Relaxed);
            }
        });

        builder.run(&universe).await?;
        Ok(())
    })
}
