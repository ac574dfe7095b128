pub mod client;
pub mod models;

pub use client::{IbkrConfig, IbkrGateway, TradingMode};
pub use gateway_trait::{AccountMonitor, ScanGateway};
