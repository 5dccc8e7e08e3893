use std::collections::HashSet;
use std::path::PathBuf;

use crate::constants::STORE_FILE;
use crate::error::Error;
use crate::services::RiskStore;
use crate::utils::get_data_dir;

pub fn run(output: Option<PathBuf>) {
    let path = output.unwrap_or_else(|| get_data_dir().join(STORE_FILE));

    println!("📊 Risk Store Status\n");

    match show_status(&path) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn show_status(path: &std::path::Path) -> Result<(), Error> {
    let store = RiskStore::load(path)?;

    if store.is_empty() {
        println!("⚠️  No risk scores found at {}. Run 'build' first.", path.display());
        return Ok(());
    }

    let tickers: HashSet<&str> = store.records().iter().map(|r| r.ticker.as_str()).collect();
    let min_date = store.records().iter().map(|r| r.date).min();
    let max_date = store.records().iter().map(|r| r.date).max();

    println!("📈 Rows: {}   Symbols: {}", store.len(), tickers.len());
    if let (Some(min), Some(max)) = (min_date, max_date) {
        println!("📅 Run dates: {} → {}", min, max);
    }

    println!("\n📊 Column Averages");
    print_average("Z-Score Risk", store.records().iter().filter_map(|r| r.z_score_risk.map(|v| v as f64)));
    print_average("Volatility", store.records().iter().filter_map(|r| r.volatility));
    print_average("Drawdown", store.records().iter().filter_map(|r| r.drawdown));
    print_average("VaR Risk", store.records().iter().filter_map(|r| r.var_risk));
    print_average("Factor-Based", store.records().iter().filter_map(|r| r.factor_score));

    Ok(())
}

/// Averages skip missing values entirely; an absent metric must never
/// be counted as zero.
fn print_average(name: &str, values: impl Iterator<Item = f64>) {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        println!("   {:<14} N/A", name);
    } else {
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        println!("   {:<14} {:.2}  ({} rows)", name, avg, values.len());
    }
}
