use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Gateway-specific columns carried alongside a result. Values are always
/// JSON scalars (string, number, bool or null).
pub type ExtraFields = BTreeMap<String, Value>;

/// One ranked row of a screener run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenResult {
    /// 1-based position in the gateway response
    pub rank: usize,
    pub symbol: String,
    pub exchange: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: ExtraFields,
}

impl ScreenResult {
    pub fn new(rank: usize, symbol: impl Into<String>) -> Self {
        Self {
            rank,
            symbol: symbol.into(),
            exchange: None,
            extra: ExtraFields::new(),
        }
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Numeric extra field. Numbers sent as strings ("12.5") are accepted too.
    pub fn extra_f64(&self, key: &str) -> Option<f64> {
        match self.extra.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extra_accessors_read_strings_and_numbers() {
        let mut result = ScreenResult::new(1, "AAPL");
        result.extra.insert("company_name".into(), json!("APPLE INC"));
        result.extra.insert("con_id".into(), json!(265598));
        result.extra.insert("scan_data".into(), json!("+2.5%"));

        assert_eq!(result.extra_str("company_name"), Some("APPLE INC"));
        assert_eq!(result.extra_f64("con_id"), Some(265598.0));
        assert_eq!(result.extra_f64("scan_data"), Some(2.5));
        assert_eq!(result.extra_f64("missing"), None);
    }
}
