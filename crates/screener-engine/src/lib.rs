pub mod engine;
pub mod normalize;
pub mod report;

pub use engine::{Screener, ScreenerConfig, StrategyRun};
pub use normalize::normalize_rows;
pub use report::{format_performance, format_results};
