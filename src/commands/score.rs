use std::time::Duration;

use crate::constants::INTERACTIVE_DELAY_MS;
use crate::error::Error;
use crate::services::{compute_metrics, RiskMetrics, YahooClient};

/// Ad-hoc scoring of up to four symbols, outside the batch pipeline.
/// Uses the fast interactive delay since the request count is tiny.
pub fn run(tickers: String) {
    let symbols: Vec<String> = tickers
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .take(4)
        .collect();

    if symbols.is_empty() {
        eprintln!("❌ No symbols given. Example: risklens score AAPL,TSLA,MSFT");
        std::process::exit(1);
    }

    match score_symbols(&symbols) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn score_symbols(symbols: &[String]) -> Result<(), Error> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Config(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async {
        let mut client = YahooClient::new()?;

        println!(
            "{:<8} {:>10} {:>10} {:>8} {:>8} {:>8} {:>8}",
            "Ticker", "Volatility", "Drawdown", "P/E", "Z-Score", "VaR", "Factor"
        );

        for (i, symbol) in symbols.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(INTERACTIVE_DELAY_MS)).await;
            }

            match client.fetch_symbol(symbol).await {
                Ok(quote) if quote.history.is_empty() => {
                    println!("{:<8} (no price data)", symbol);
                }
                Ok(quote) => {
                    let metrics = compute_metrics(&quote.history, &quote.fundamentals);
                    print_row(symbol, &metrics, quote.fundamentals.get("trailingPE"));
                }
                Err(e) => {
                    // Distinguishable from "no data": the fetch failed.
                    println!("{:<8} (fetch failed: {})", symbol, e);
                }
            }
        }

        Ok(())
    })
}

fn fmt_pct(v: Option<f64>) -> String {
    v.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "N/A".to_string())
}

fn fmt_int(v: Option<i64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn print_row(symbol: &str, metrics: &RiskMetrics, pe: Option<f64>) {
    println!(
        "{:<8} {:>10} {:>10} {:>8} {:>8} {:>8} {:>8}",
        symbol,
        fmt_pct(metrics.volatility),
        fmt_pct(metrics.drawdown),
        fmt_pct(pe),
        fmt_int(metrics.z_score_risk),
        fmt_pct(metrics.var_risk),
        fmt_pct(metrics.factor_score),
    );
}
