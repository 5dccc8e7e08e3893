pub mod builder;
pub mod risk;
pub mod store;
pub mod universe;
pub mod yahoo;

pub use builder::{BatchBuilder, SkipLog};
pub use risk::{compute_metrics, RiskMetrics};
pub use store::RiskStore;
pub use universe::UniverseClient;
pub use yahoo::YahooClient;
