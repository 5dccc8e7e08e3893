//! Index constituent universe provider.
//!
//! Fetches the current S&P 500 constituent list from a public
//! reference table (CSV whose first header column is "Symbol").
//! Read-only; the result is fetched once per run and cached by the
//! caller. Universe failure is fatal to a batch run, so everything
//! here maps to `AppError::UniverseUnavailable`.

use csv::ReaderBuilder;
use isahc::config::Configurable;
use isahc::{AsyncReadResponseExt, HttpClient};
use std::time::Duration;
use tracing::info;

use crate::constants::DEFAULT_UNIVERSE_URL;
use crate::error::{AppError, Result};

pub struct UniverseClient {
    client: HttpClient,
    url: String,
}

impl UniverseClient {
    pub fn new(url: Option<String>) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .redirect_policy(isahc::config::RedirectPolicy::Limit(5))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create universe client: {}", e)))?;

        Ok(Self {
            client,
            url: url.unwrap_or_else(|| DEFAULT_UNIVERSE_URL.to_string()),
        })
    }

    /// Fetch the ordered constituent symbol list.
    pub async fn fetch(&self) -> Result<Vec<String>> {
        let mut response = self
            .client
            .get_async(self.url.as_str())
            .await
            .map_err(|e| AppError::UniverseUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::UniverseUnavailable(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::UniverseUnavailable(e.to_string()))?;

        let symbols = parse_constituents(&body)?;
        info!(count = symbols.len(), "fetched constituent universe");
        Ok(symbols)
    }
}

/// Parse the constituents table, validating the expected shape.
fn parse_constituents(body: &str) -> Result<Vec<String>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::UniverseUnavailable(format!("unreadable table: {}", e)))?;

    if headers.get(0).map(str::trim) != Some("Symbol") {
        return Err(AppError::UniverseUnavailable(format!(
            "unexpected table shape: first column is {:?}, expected \"Symbol\"",
            headers.get(0)
        )));
    }

    let mut symbols = Vec::new();
    for result in reader.records() {
        let record =
            result.map_err(|e| AppError::UniverseUnavailable(format!("bad table row: {}", e)))?;
        if let Some(symbol) = record.get(0) {
            let symbol = symbol.trim();
            if !symbol.is_empty() {
                symbols.push(symbol.to_uppercase());
            }
        }
    }

    if symbols.is_empty() {
        return Err(AppError::UniverseUnavailable(
            "constituent table contained no symbols".to_string(),
        ));
    }

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_constituents() {
        let body = "Symbol,Name,Sector\nAAPL,Apple Inc.,Technology\nmmm,3M,Industrials\n";
        let symbols = parse_constituents(body).unwrap();
        assert_eq!(symbols, vec!["AAPL".to_string(), "MMM".to_string()]);
    }

    #[test]
    fn test_parse_preserves_table_order() {
        let body = "Symbol,Name\nZTS,Zoetis\nABT,Abbott\nAAPL,Apple\n";
        let symbols = parse_constituents(body).unwrap();
        assert_eq!(symbols, vec!["ZTS", "ABT", "AAPL"]);
    }

    #[test]
    fn test_parse_rejects_wrong_header() {
        let body = "Ticker,Name\nAAPL,Apple Inc.\n";
        assert!(matches!(
            parse_constituents(body),
            Err(AppError::UniverseUnavailable(_))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_table() {
        assert!(matches!(
            parse_constituents("Symbol,Name\n"),
            Err(AppError::UniverseUnavailable(_))
        ));
    }
}
