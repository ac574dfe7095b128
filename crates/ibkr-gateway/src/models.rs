use serde::{Deserialize, Serialize};

/// `GET /iserver/auth/status` response
#[derive(Debug, Clone, Deserialize)]
pub struct IbkrAuthStatus {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub competing: bool,
    pub message: Option<String>,
}

impl IbkrAuthStatus {
    pub fn is_ready(&self) -> bool {
        self.authenticated && self.connected && !self.competing
    }
}

/// `GET /iserver/accounts` response
#[derive(Debug, Clone, Deserialize)]
pub struct IbkrAccounts {
    #[serde(default)]
    pub accounts: Vec<String>,
}

/// Filter entry of a scanner request
#[derive(Debug, Clone, Serialize)]
pub struct IbkrScannerFilter {
    pub code: String,
    pub value: f64,
}

/// `POST /iserver/scanner/run` body
#[derive(Debug, Clone, Serialize)]
pub struct IbkrScannerRequest {
    pub instrument: String,
    pub location: String,
    #[serde(rename = "type")]
    pub scan_type: String,
    pub filter: Vec<IbkrScannerFilter>,
}

/// `POST /iserver/scanner/run` response. Contract rows are kept untyped
/// because their columns vary with the scan type.
#[derive(Debug, Clone, Deserialize)]
pub struct IbkrScannerResponse {
    #[serde(default)]
    pub contracts: Vec<serde_json::Value>,
    pub scan_data_column_name: Option<String>,
}

/// One field of `GET /portfolio/{accountId}/summary`
#[derive(Debug, Clone, Deserialize)]
pub struct IbkrSummaryField {
    pub amount: Option<f64>,
    pub value: Option<String>,
}

impl IbkrSummaryField {
    /// Text value if the gateway sent one, otherwise the numeric amount.
    pub fn display_value(&self) -> Option<String> {
        match (&self.value, self.amount) {
            (Some(v), _) if !v.is_empty() => Some(v.clone()),
            (_, Some(a)) => Some(format!("{:.2}", a)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unread_gateway_fields_are_ignored() {
        let accounts: IbkrAccounts = serde_json::from_value(json!({
            "accounts": ["DU111", "DU222"],
            "selectedAccount": "DU222",
            "aliases": {"DU111": "main"}
        }))
        .unwrap();
        assert_eq!(accounts.accounts, vec!["DU111", "DU222"]);

        let field: IbkrSummaryField = serde_json::from_value(json!({
            "amount": 25000.0,
            "currency": "USD",
            "isNull": false,
            "timestamp": 1736937000000u64,
            "value": null
        }))
        .unwrap();
        assert_eq!(field.display_value().as_deref(), Some("25000.00"));
    }
}
