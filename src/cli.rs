use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;
use crate::constants::{DEFAULT_DELAY_SECS, DEFAULT_MAX_SYMBOLS};

#[derive(Parser)]
#[command(name = "risklens")]
#[command(about = "Incremental S&P 500 risk score builder", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Incrementally build risk scores for index constituents
    Build {
        /// Delay between symbol fetches, in seconds
        #[arg(long, default_value_t = DEFAULT_DELAY_SECS)]
        delay_secs: u64,

        /// Maximum symbols to process before stopping cleanly
        #[arg(long, default_value_t = DEFAULT_MAX_SYMBOLS)]
        max_symbols: usize,

        /// Risk score CSV path (default: <data dir>/sp500_risk_scores.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the constituent table URL
        #[arg(long)]
        universe_url: Option<String>,
    },
    /// Score up to 4 symbols ad hoc (comma-separated)
    Score {
        /// Symbols, e.g. "AAPL,TSLA,MSFT,GOOGL"
        tickers: String,
    },
    /// Summarize the durable risk score store
    Status {
        /// Risk score CSV path (default: <data dir>/sp500_risk_scores.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            delay_secs,
            max_symbols,
            output,
            universe_url,
        } => {
            commands::build::run(delay_secs, max_symbols, output, universe_url);
        }
        Commands::Score { tickers } => {
            commands::score::run(tickers);
        }
        Commands::Status { output } => {
            commands::status::run(output);
        }
    }
}
