use serde::{Deserialize, Serialize};

/// Snapshot of named fundamental attributes for one symbol.
///
/// Every attribute is optional; the provider routinely omits fields
/// for ETFs, recent listings, and foreign issuers. Non-finite values
/// are treated the same as absent ones by consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub trailing_pe: Option<f64>,
    pub beta: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub price_to_book: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub market_cap: Option<f64>,
    pub short_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
}

impl FundamentalSnapshot {
    /// Look up an attribute by its provider name, filtering out
    /// non-finite values.
    pub fn get(&self, name: &str) -> Option<f64> {
        let value = match name {
            "trailingPE" => self.trailing_pe,
            "beta" => self.beta,
            "dividendYield" => self.dividend_yield,
            "revenueGrowth" => self.revenue_growth,
            "priceToBook" => self.price_to_book,
            "returnOnAssets" => self.return_on_assets,
            "returnOnEquity" => self.return_on_equity,
            "marketCap" => self.market_cap,
            "shortRatio" => self.short_ratio,
            "debtToEquity" => self.debt_to_equity,
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }
}
