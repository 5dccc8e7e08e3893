//! Yahoo Finance market data fetcher.
//!
//! Two endpoints: the v8 chart API for daily price history and the
//! v10 quoteSummary API for fundamental attributes. Yahoo has no
//! official API; requests carry rotating browser user-agents, go
//! through a sliding-window rate limiter, and retry with exponential
//! backoff plus jitter.
//!
//! A symbol Yahoo has no data for yields an empty history / empty
//! snapshot, which is a valid outcome, not an error. Network and
//! provider faults surface as `AppError::Fetch` and are recoverable
//! per symbol.

use chrono::{Duration as ChronoDuration, Utc};
use isahc::config::Configurable;
use isahc::{AsyncReadResponseExt, HttpClient};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant, SystemTime};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::constants::{LOOKBACK_DAYS, QUOTE_CACHE_TTL_SECS, RATE_LIMIT_PER_MINUTE};
use crate::error::{AppError, Result};
use crate::models::{FundamentalSnapshot, PriceBar, PriceHistory};

const CHART_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const QUOTE_SUMMARY_BASE_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const QUOTE_SUMMARY_MODULES: &str = "summaryDetail,defaultKeyStatistics,financialData";
const MAX_RETRIES: u32 = 3;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15",
];

/// History plus fundamentals for one symbol, fetched together.
#[derive(Debug, Clone, Default)]
pub struct SymbolQuote {
    pub history: PriceHistory,
    pub fundamentals: FundamentalSnapshot,
}

/// Seam between the batch orchestrator and the network. The builder
/// only needs this one operation, so tests can drive it with a stub.
pub trait QuoteProvider {
    fn fetch_quote(&mut self, symbol: &str) -> impl Future<Output = Result<SymbolQuote>>;
}

/// Time-bounded memo of per-symbol quote results.
///
/// Injected into the client rather than kept as an ambient global so
/// the ad-hoc `score` path and the batch path share one policy.
pub struct QuoteCache {
    entries: HashMap<String, (Instant, SymbolQuote)>,
    ttl: Duration,
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, symbol: &str) -> Option<SymbolQuote> {
        let (stored_at, quote) = self.entries.get(symbol)?;
        if stored_at.elapsed() < self.ttl {
            Some(quote.clone())
        } else {
            None
        }
    }

    pub fn put(&mut self, symbol: &str, quote: SymbolQuote) {
        self.entries.insert(symbol.to_string(), (Instant::now(), quote));
    }
}

// Chart API response shape. Yahoo reports unknown symbols as an
// error payload with code "Not Found" rather than an HTTP failure.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

pub struct YahooClient {
    client: HttpClient,
    request_timestamps: Vec<SystemTime>,
    rate_limit_per_minute: u32,
    cache: QuoteCache,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        Self::with_cache(QuoteCache::new(Duration::from_secs(QUOTE_CACHE_TTL_SECS)))
    }

    pub fn with_cache(cache: QuoteCache) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .redirect_policy(isahc::config::RedirectPolicy::Limit(5))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create Yahoo client: {}", e)))?;

        Ok(Self {
            client,
            request_timestamps: Vec::new(),
            rate_limit_per_minute: RATE_LIMIT_PER_MINUTE,
            cache,
        })
    }

    fn user_agent(&self) -> &'static str {
        use rand::seq::SliceRandom;
        USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0])
    }

    /// Sliding-window rate limit across the last minute.
    async fn enforce_rate_limit(&mut self) {
        let now = SystemTime::now();

        self.request_timestamps.retain(|&t| {
            now.duration_since(t).unwrap_or(Duration::from_secs(0)) < Duration::from_secs(60)
        });

        if self.request_timestamps.len() >= self.rate_limit_per_minute as usize {
            if let Some(&oldest) = self.request_timestamps.first() {
                let elapsed = now.duration_since(oldest).unwrap_or(Duration::from_secs(0));
                let wait = Duration::from_secs(60).saturating_sub(elapsed);
                if !wait.is_zero() {
                    sleep(wait + Duration::from_millis(100)).await;
                }
            }
        }

        self.request_timestamps.push(now);
    }

    /// GET with retries. Retries on transport errors, 429 and 5xx;
    /// returns the body for any other status so callers can interpret
    /// provider-level error payloads (404 carries a JSON body).
    async fn get_with_retry(&mut self, symbol: &str, url: &str) -> Result<String> {
        let mut last_error: Option<String> = None;

        for attempt in 0..MAX_RETRIES {
            self.enforce_rate_limit().await;

            if attempt > 0 {
                let backoff = 2.0_f64.powi(attempt as i32 - 1) + rand::random::<f64>();
                let delay = Duration::from_secs_f64(backoff).min(Duration::from_secs(60));
                let reason = last_error.as_deref().unwrap_or("unknown error");
                info!(
                    symbol,
                    attempt = attempt + 1,
                    reason,
                    "retrying Yahoo request after {:.1}s",
                    delay.as_secs_f64()
                );
                sleep(delay).await;
            }

            let request = isahc::Request::builder()
                .uri(url)
                .method("GET")
                .header("Accept", "application/json, text/plain, */*")
                .header("User-Agent", self.user_agent())
                .body(())
                .map_err(|e| AppError::fetch(symbol, e))?;

            match self.client.send_async(request).await {
                Ok(mut response) => {
                    let status = response.status();

                    if status.as_u16() == 429 || status.is_server_error() {
                        last_error = Some(format!("HTTP {}", status));
                        continue;
                    }

                    return response.text().await.map_err(|e| AppError::fetch(symbol, e));
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                }
            }
        }

        Err(AppError::fetch(
            symbol,
            last_error.unwrap_or_else(|| "max retries exceeded".to_string()),
        ))
    }

    /// Fetch trailing 1y of daily bars. Empty history when Yahoo has
    /// no data for the symbol.
    pub async fn fetch_history(&mut self, symbol: &str) -> Result<PriceHistory> {
        let end = Utc::now();
        let start = end - ChronoDuration::days(LOOKBACK_DAYS);
        let url = format!(
            "{}/{}?period1={}&period2={}&interval=1d",
            CHART_BASE_URL,
            symbol,
            start.timestamp(),
            end.timestamp()
        );

        let body = self.get_with_retry(symbol, &url).await?;
        parse_chart(symbol, &body)
    }

    /// Fetch the fundamental snapshot. Attributes Yahoo omits stay
    /// None; a symbol with no quoteSummary at all yields an empty
    /// snapshot.
    pub async fn fetch_fundamentals(&mut self, symbol: &str) -> Result<FundamentalSnapshot> {
        let url = format!(
            "{}/{}?modules={}",
            QUOTE_SUMMARY_BASE_URL, symbol, QUOTE_SUMMARY_MODULES
        );

        let body = self.get_with_retry(symbol, &url).await?;
        let value: Value = serde_json::from_str(&body).map_err(|e| AppError::fetch(symbol, e))?;
        Ok(parse_quote_summary(&value))
    }

    /// History + fundamentals behind the TTL cache.
    pub async fn fetch_symbol(&mut self, symbol: &str) -> Result<SymbolQuote> {
        if let Some(cached) = self.cache.get(symbol) {
            debug!(symbol, "quote cache hit");
            return Ok(cached);
        }

        let history = self.fetch_history(symbol).await?;
        // No point asking for fundamentals when the symbol has no
        // price data at all; the batch skips it anyway.
        let fundamentals = if history.is_empty() {
            FundamentalSnapshot::default()
        } else {
            self.fetch_fundamentals(symbol).await?
        };

        let quote = SymbolQuote {
            history,
            fundamentals,
        };
        self.cache.put(symbol, quote.clone());
        Ok(quote)
    }
}

impl QuoteProvider for YahooClient {
    async fn fetch_quote(&mut self, symbol: &str) -> Result<SymbolQuote> {
        self.fetch_symbol(symbol).await
    }
}

/// Parse a chart API body into a price history. "Not Found" and
/// empty results map to an empty history.
fn parse_chart(symbol: &str, body: &str) -> Result<PriceHistory> {
    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| AppError::fetch(symbol, e))?;

    let data = match response.chart.result.and_then(|r| r.into_iter().next()) {
        Some(data) => data,
        None => {
            return match response.chart.error {
                Some(err) if err.code == "Not Found" => Ok(PriceHistory::default()),
                Some(err) => Err(AppError::fetch(
                    symbol,
                    format!("{}: {}", err.code, err.description),
                )),
                None => Err(AppError::fetch(symbol, "empty chart result")),
            };
        }
    };

    let timestamps = match data.timestamp {
        Some(t) => t,
        None => return Ok(PriceHistory::default()),
    };
    let quote = match data.indicators.quote.into_iter().next() {
        Some(q) => q,
        None => return Ok(PriceHistory::default()),
    };

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        // Holidays and halted sessions come through as null closes.
        let close = match quote.close.get(i).copied().flatten() {
            Some(c) => c,
            None => continue,
        };
        let date = match chrono::DateTime::from_timestamp(ts, 0) {
            Some(dt) => dt.naive_utc().date(),
            None => continue,
        };
        bars.push(PriceBar { date, close });
    }

    Ok(PriceHistory::new(bars))
}

/// Pull a `{raw: …}` numeric leaf out of a quoteSummary module.
fn raw_field(result: &Value, module: &str, field: &str) -> Option<f64> {
    result
        .get(module)?
        .get(field)?
        .get("raw")?
        .as_f64()
        .filter(|v| v.is_finite())
}

/// First present value of a field across the listed modules.
fn raw_field_any(result: &Value, modules: &[&str], field: &str) -> Option<f64> {
    modules.iter().find_map(|m| raw_field(result, m, field))
}

fn parse_quote_summary(value: &Value) -> FundamentalSnapshot {
    let result = match value
        .get("quoteSummary")
        .and_then(|qs| qs.get("result"))
        .and_then(|r| r.get(0))
    {
        Some(result) => result,
        None => return FundamentalSnapshot::default(),
    };

    FundamentalSnapshot {
        trailing_pe: raw_field(result, "summaryDetail", "trailingPE"),
        beta: raw_field_any(result, &["summaryDetail", "defaultKeyStatistics"], "beta"),
        dividend_yield: raw_field(result, "summaryDetail", "dividendYield"),
        revenue_growth: raw_field(result, "financialData", "revenueGrowth"),
        price_to_book: raw_field(result, "defaultKeyStatistics", "priceToBook"),
        return_on_assets: raw_field(result, "financialData", "returnOnAssets"),
        return_on_equity: raw_field(result, "financialData", "returnOnEquity"),
        market_cap: raw_field(result, "summaryDetail", "marketCap"),
        short_ratio: raw_field(result, "defaultKeyStatistics", "shortRatio"),
        debt_to_equity: raw_field(result, "financialData", "debtToEquity"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chart_bars() {
        let body = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1717372800, 1717459200, 1717545600],
                    "indicators": {
                        "quote": [{"close": [100.0, null, 102.5]}]
                    }
                }],
                "error": null
            }
        }"#;
        let history = parse_chart("AAPL", body).unwrap();
        // The null close (holiday) is skipped.
        assert_eq!(history.len(), 2);
        assert_eq!(history.bars[0].close, 100.0);
        assert_eq!(history.bars[1].close, 102.5);
        assert!(history.bars[0].date < history.bars[1].date);
    }

    #[test]
    fn test_parse_chart_unknown_symbol_is_empty() {
        let body = r#"{
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found"}
            }
        }"#;
        let history = parse_chart("NOSUCH", body).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn test_parse_chart_provider_error_is_fetch_error() {
        let body = r#"{
            "chart": {
                "result": null,
                "error": {"code": "Internal Server Error", "description": "boom"}
            }
        }"#;
        assert!(matches!(
            parse_chart("AAPL", body),
            Err(AppError::Fetch { .. })
        ));
    }

    #[test]
    fn test_parse_chart_missing_timestamps_is_empty() {
        let body = r#"{
            "chart": {
                "result": [{"indicators": {"quote": [{"close": []}]}}],
                "error": null
            }
        }"#;
        assert!(parse_chart("AAPL", body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_quote_summary_raw_fields() {
        let body = r#"{
            "quoteSummary": {
                "result": [{
                    "summaryDetail": {
                        "trailingPE": {"raw": 28.4, "fmt": "28.40"},
                        "beta": {"raw": 1.25},
                        "dividendYield": {"raw": 0.0055},
                        "marketCap": {"raw": 2.9e12}
                    },
                    "defaultKeyStatistics": {
                        "priceToBook": {"raw": 44.1},
                        "shortRatio": {"raw": 2.1}
                    },
                    "financialData": {
                        "returnOnAssets": {"raw": 0.21},
                        "returnOnEquity": {"raw": 1.47},
                        "revenueGrowth": {"raw": 0.04},
                        "debtToEquity": {"raw": 140.0}
                    }
                }],
                "error": null
            }
        }"#;
        let value: Value = serde_json::from_str(body).unwrap();
        let f = parse_quote_summary(&value);
        assert_eq!(f.trailing_pe, Some(28.4));
        assert_eq!(f.beta, Some(1.25));
        assert_eq!(f.price_to_book, Some(44.1));
        assert_eq!(f.debt_to_equity, Some(140.0));
        assert_eq!(f.market_cap, Some(2.9e12));
    }

    #[test]
    fn test_parse_quote_summary_missing_result() {
        let value: Value =
            serde_json::from_str(r#"{"quoteSummary": {"result": null, "error": null}}"#).unwrap();
        assert_eq!(parse_quote_summary(&value), FundamentalSnapshot::default());
    }

    #[test]
    fn test_quote_cache_ttl() {
        let mut cache = QuoteCache::new(Duration::from_secs(60));
        assert!(cache.get("AAPL").is_none());

        cache.put("AAPL", SymbolQuote::default());
        assert!(cache.get("AAPL").is_some());

        // Zero TTL expires immediately.
        let mut expired = QuoteCache::new(Duration::ZERO);
        expired.put("AAPL", SymbolQuote::default());
        assert!(expired.get("AAPL").is_none());
    }
}
