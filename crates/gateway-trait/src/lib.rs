use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Scan types (gateway-agnostic)
// ---------------------------------------------------------------------------

/// A single scanner filter, e.g. `priceAbove = 5.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFilter {
    pub code: String,
    pub value: f64,
}

impl ScanFilter {
    pub fn new(code: impl Into<String>, value: f64) -> Self {
        Self {
            code: code.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Security type, e.g. "STK"
    pub instrument: String,
    /// Market segment, e.g. "STK.US.MAJOR"
    pub location_code: String,
    pub scan_code: String,
    pub filters: Vec<ScanFilter>,
    pub max_results: usize,
}

impl ScanRequest {
    pub fn filter_value(&self, code: &str) -> Option<f64> {
        self.filters.iter().find(|f| f.code == code).map(|f| f.value)
    }
}

/// One scanner row exactly as the gateway returned it. Column sets differ per
/// scan code and gateway, so no schema is imposed here.
pub type ScanRow = serde_json::Map<String, serde_json::Value>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Not connected to gateway")]
    NotConnected,

    #[error("Gateway rejected request: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Gateway request timed out")]
    Timeout,

    #[error("No accounts available")]
    NoAccounts,
}

// ---------------------------------------------------------------------------
// Account types
// ---------------------------------------------------------------------------

/// Account summary tags worth showing to a user.
pub const SUMMARY_TAGS: [&str; 8] = [
    "AccountType",
    "NetLiquidation",
    "TotalCashValue",
    "BuyingPower",
    "AvailableFunds",
    "GrossPositionValue",
    "UnrealizedPnL",
    "RealizedPnL",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account: String,
    pub trading_mode: String,
    /// Tag -> raw value, restricted to [`SUMMARY_TAGS`]
    pub values: BTreeMap<String, String>,
}

impl AccountSummary {
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.values.get(tag).map(String::as_str)
    }

    pub fn decimal(&self, tag: &str) -> Option<Decimal> {
        self.get(tag).and_then(|v| Decimal::from_str(v).ok())
    }

    pub fn net_liquidation_decimal(&self) -> Decimal {
        self.decimal("NetLiquidation").unwrap_or_default()
    }
    pub fn buying_power_decimal(&self) -> Decimal {
        self.decimal("BuyingPower").unwrap_or_default()
    }
    pub fn cash_decimal(&self) -> Decimal {
        self.decimal("TotalCashValue").unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Gateway traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ScanGateway: Send + Sync {
    /// Establish (or re-validate) the gateway session
    async fn connect(&self) -> Result<(), GatewayError>;

    /// Tear down the session. A no-op when not connected.
    async fn disconnect(&self) -> Result<(), GatewayError>;

    /// Last known connection state; does not touch the network
    fn is_connected(&self) -> bool;

    /// Run a scanner query and return rows in gateway rank order
    async fn scan(&self, request: &ScanRequest) -> Result<Vec<ScanRow>, GatewayError>;

    /// Gateway name for logging
    fn gateway_name(&self) -> &str;
}

#[async_trait]
pub trait AccountMonitor: Send + Sync {
    /// Managed account ids
    async fn accounts(&self) -> Result<Vec<String>, GatewayError>;

    /// Summary for `account`, or for the configured/first account when `None`
    async fn account_summary(&self, account: Option<&str>) -> Result<AccountSummary, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_decimals_parse_and_default() {
        let mut values = BTreeMap::new();
        values.insert("NetLiquidation".to_string(), "1033883.10".to_string());
        values.insert("BuyingPower".to_string(), "n/a".to_string());
        let summary = AccountSummary {
            account: "DU123".to_string(),
            trading_mode: "paper".to_string(),
            values,
        };

        assert_eq!(
            summary.net_liquidation_decimal(),
            Decimal::from_str("1033883.10").unwrap()
        );
        assert_eq!(summary.buying_power_decimal(), Decimal::ZERO);
        assert_eq!(summary.cash_decimal(), Decimal::ZERO);
    }

    #[test]
    fn filter_value_looks_up_by_code() {
        let request = ScanRequest {
            instrument: "STK".to_string(),
            location_code: "STK.US.MAJOR".to_string(),
            scan_code: "MOST_ACTIVE".to_string(),
            filters: vec![ScanFilter::new("priceAbove", 5.0)],
            max_results: 10,
        };
        assert_eq!(request.filter_value("priceAbove"), Some(5.0));
        assert_eq!(request.filter_value("priceBelow"), None);
    }
}
