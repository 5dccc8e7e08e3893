mod build_config;
mod fundamentals;
mod price_bar;
mod risk_record;

pub use build_config::{BuildConfig, BuildStats};
pub use fundamentals::FundamentalSnapshot;
pub use price_bar::{PriceBar, PriceHistory};
pub use risk_record::RiskRecord;
