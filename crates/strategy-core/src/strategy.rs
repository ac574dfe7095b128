//! Screening strategy definitions
//!
//! A strategy pairs a gateway scan code with filter bounds and categorical
//! metadata, and owns the running performance record of its picks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{timestamp, ScanCode, ScreenerError, TradingBias, TradingStyle};

const MAX_NAME_LEN: usize = 64;

/// Filtering criteria for a scan. Every bound is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_max: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_min: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_max: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_volume_min: Option<u64>,

    /// Market cap bounds in USD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_max: Option<f64>,

    /// Daily change bounds in percent; may be negative
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_max: Option<f64>,

    /// Implied volatility bounds in percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volatility_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volatility_max: Option<f64>,
}

impl ScreenFilters {
    pub fn is_empty(&self) -> bool {
        *self == ScreenFilters::default()
    }

    pub fn validate(&self) -> Result<(), ScreenerError> {
        check_unsigned("price", self.price_min, self.price_max)?;
        check_unsigned("market_cap", self.market_cap_min, self.market_cap_max)?;
        check_unsigned("volatility", self.volatility_min, self.volatility_max)?;
        check_bounds(
            "price_change",
            self.price_change_min,
            self.price_change_max,
        )?;
        check_bounds(
            "volume",
            self.volume_min.map(|v| v as f64),
            self.volume_max.map(|v| v as f64),
        )?;
        Ok(())
    }
}

fn check_unsigned(field: &str, min: Option<f64>, max: Option<f64>) -> Result<(), ScreenerError> {
    for (suffix, value) in [("min", min), ("max", max)] {
        if let Some(v) = value {
            if v < 0.0 {
                return Err(ScreenerError::Validation(format!(
                    "{}_{} must not be negative (got {})",
                    field, suffix, v
                )));
            }
        }
    }
    check_bounds(field, min, max)
}

fn check_bounds(field: &str, min: Option<f64>, max: Option<f64>) -> Result<(), ScreenerError> {
    for (suffix, value) in [("min", min), ("max", max)] {
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(ScreenerError::Validation(format!(
                    "{}_{} must be a finite number",
                    field, suffix
                )));
            }
        }
    }
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(ScreenerError::Validation(format!(
                "{}_min ({}) is greater than {}_max ({})",
                field, lo, field, hi
            )));
        }
    }
    Ok(())
}

/// Running statistics of a strategy's picks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyPerformance {
    pub total_runs: u64,
    pub successful_picks: u64,
    pub failed_picks: u64,
    pub avg_return: f64,
    #[serde(deserialize_with = "timestamp::deserialize_opt")]
    pub last_run: Option<DateTime<Utc>>,
    pub last_result_count: usize,
}

impl StrategyPerformance {
    pub fn total_picks(&self) -> u64 {
        self.successful_picks + self.failed_picks
    }

    /// Fraction of picks that succeeded, `None` until a pick is recorded.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.total_picks();
        if total > 0 {
            Some(self.successful_picks as f64 / total as f64)
        } else {
            None
        }
    }

    /// Record the outcome of a pick and fold its return into the running mean.
    pub fn record_outcome(
        &mut self,
        successful: bool,
        return_pct: f64,
        at: DateTime<Utc>,
    ) -> Result<(), ScreenerError> {
        if !return_pct.is_finite() {
            return Err(ScreenerError::Validation(format!(
                "return_pct must be a finite number (got {})",
                return_pct
            )));
        }

        self.total_runs += 1;
        if successful {
            self.successful_picks += 1;
        } else {
            self.failed_picks += 1;
        }

        let picks = self.total_picks();
        self.avg_return = (self.avg_return * (picks - 1) as f64 + return_pct) / picks as f64;
        self.last_run = Some(at);
        Ok(())
    }

    /// Stamp a completed screen. Does not count as a run with an outcome.
    pub fn record_run(&mut self, result_count: usize, at: DateTime<Utc>) {
        self.last_run = Some(at);
        self.last_result_count = result_count;
    }

    pub fn validate(&self) -> Result<(), ScreenerError> {
        if self.total_picks() > self.total_runs {
            return Err(ScreenerError::Validation(format!(
                "performance records {} picks but only {} runs",
                self.total_picks(),
                self.total_runs
            )));
        }
        if !self.avg_return.is_finite() {
            return Err(ScreenerError::Validation(
                "avg_return must be a finite number".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_instrument() -> String {
    "STK".to_string()
}

fn default_enabled() -> bool {
    true
}

/// A named, persisted screening configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningStrategy {
    pub name: String,
    pub description: String,
    pub scan_code: ScanCode,
    #[serde(default)]
    pub filters: ScreenFilters,
    #[serde(default)]
    pub bias: TradingBias,
    #[serde(default)]
    pub style: TradingStyle,
    /// Security type passed to the scanner (STK, ETF.EQ.US, ...)
    #[serde(default = "default_instrument")]
    pub instrument: String,
    /// Market segment for this strategy's scans; the screener default
    /// applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_code: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub performance: StrategyPerformance,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub modified: DateTime<Utc>,
}

impl ScreeningStrategy {
    /// Strategy with default filters and categories.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        scan_code: &str,
    ) -> Result<Self, ScreenerError> {
        Self::builder(name, scan_code).description(description).build()
    }

    /// Start building a strategy. `scan_code` is parsed against the known set.
    pub fn builder(name: impl Into<String>, scan_code: &str) -> StrategyBuilder {
        StrategyBuilder::new(name, scan_code)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Update the modified timestamp
    pub fn touch(&mut self) {
        self.modified = Utc::now();
    }

    pub fn validate(&self) -> Result<(), ScreenerError> {
        validate_name(&self.name)?;
        if self.instrument.trim().is_empty() {
            return Err(ScreenerError::Validation(format!(
                "strategy '{}' has an empty instrument",
                self.name
            )));
        }
        if self
            .location_code
            .as_deref()
            .is_some_and(|code| code.trim().is_empty())
        {
            return Err(ScreenerError::Validation(format!(
                "strategy '{}' has an empty location code",
                self.name
            )));
        }
        self.filters.validate()?;
        self.performance.validate()?;
        Ok(())
    }
}

/// Names double as file stems, so only a conservative character set is allowed.
pub fn validate_name(name: &str) -> Result<(), ScreenerError> {
    if name.is_empty() {
        return Err(ScreenerError::Validation(
            "strategy name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ScreenerError::Validation(format!(
            "strategy name is longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(ScreenerError::Validation(format!(
            "strategy name '{}' contains unsupported character {:?}",
            name, bad
        )));
    }
    Ok(())
}

/// Validating constructor for [`ScreeningStrategy`].
#[derive(Debug, Clone)]
pub struct StrategyBuilder {
    name: String,
    scan_code: String,
    description: String,
    filters: ScreenFilters,
    bias: TradingBias,
    style: TradingStyle,
    instrument: String,
    location_code: Option<String>,
    tags: BTreeSet<String>,
    enabled: bool,
}

impl StrategyBuilder {
    fn new(name: impl Into<String>, scan_code: &str) -> Self {
        Self {
            name: name.into(),
            scan_code: scan_code.to_string(),
            description: String::new(),
            filters: ScreenFilters::default(),
            bias: TradingBias::default(),
            style: TradingStyle::default(),
            instrument: default_instrument(),
            location_code: None,
            tags: BTreeSet::new(),
            enabled: true,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn filters(mut self, filters: ScreenFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn bias(mut self, bias: TradingBias) -> Self {
        self.bias = bias;
        self
    }

    pub fn style(mut self, style: TradingStyle) -> Self {
        self.style = style;
        self
    }

    pub fn instrument(mut self, instrument: impl Into<String>) -> Self {
        self.instrument = instrument.into();
        self
    }

    pub fn location_code(mut self, location_code: impl Into<String>) -> Self {
        self.location_code = Some(location_code.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn build(self) -> Result<ScreeningStrategy, ScreenerError> {
        let scan_code = self.scan_code.parse::<ScanCode>()?;
        let now = Utc::now();
        let strategy = ScreeningStrategy {
            name: self.name,
            description: self.description,
            scan_code,
            filters: self.filters,
            bias: self.bias,
            style: self.style,
            instrument: self.instrument,
            location_code: self.location_code,
            tags: self.tags,
            enabled: self.enabled,
            performance: StrategyPerformance::default(),
            created: now,
            modified: now,
        };
        strategy.validate()?;
        Ok(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn momentum() -> ScreeningStrategy {
        ScreeningStrategy::builder("momentum_test", "TOP_PERC_GAIN")
            .description("Small cap gainers")
            .filters(ScreenFilters {
                price_min: Some(2.0),
                price_max: Some(20.0),
                volume_min: Some(500_000),
                ..Default::default()
            })
            .bias(TradingBias::Long)
            .style(TradingStyle::Momentum)
            .tags(["momentum", "long"])
            .build()
            .unwrap()
    }

    #[test]
    fn builder_produces_enabled_strategy_with_fresh_performance() {
        let s = momentum();
        assert!(s.enabled);
        assert_eq!(s.scan_code, ScanCode::TopPercGain);
        assert_eq!(s.instrument, "STK");
        assert_eq!(s.performance, StrategyPerformance::default());
        assert!(s.has_tag("momentum"));
    }

    #[test]
    fn inverted_price_bounds_are_rejected() {
        let err = ScreeningStrategy::builder("inverted", "MOST_ACTIVE")
            .filters(ScreenFilters {
                price_min: Some(50.0),
                price_max: Some(10.0),
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, ScreenerError::Validation(_)));
        assert!(err.to_string().contains("price_min"));
    }

    #[test]
    fn negative_bounds_are_rejected_except_price_change() {
        let negative_price = ScreenFilters {
            price_min: Some(-1.0),
            ..Default::default()
        };
        assert!(negative_price.validate().is_err());

        let negative_cap = ScreenFilters {
            market_cap_max: Some(-5.0),
            ..Default::default()
        };
        assert!(negative_cap.validate().is_err());

        let falling = ScreenFilters {
            price_change_min: Some(-15.0),
            price_change_max: Some(-5.0),
            ..Default::default()
        };
        assert!(falling.validate().is_ok());
    }

    #[test]
    fn non_finite_bounds_are_rejected() {
        let filters = ScreenFilters {
            price_max: Some(f64::NAN),
            ..Default::default()
        };
        assert!(filters.validate().is_err());
    }

    #[test]
    fn unsafe_names_are_rejected() {
        for name in ["", "../escape", "with space", "semi;colon", "dot.json"] {
            let result = ScreeningStrategy::builder(name, "MOST_ACTIVE").build();
            assert!(result.is_err(), "{:?} should be rejected", name);
        }
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(validate_name(&long).is_err());
        assert!(validate_name("gap-and-go_2").is_ok());
    }

    #[test]
    fn unknown_scan_code_fails_construction() {
        let err = ScreeningStrategy::builder("bad_code", "NOT_A_SCAN")
            .build()
            .unwrap_err();
        assert!(matches!(err, ScreenerError::Validation(_)));
    }

    #[test]
    fn outcomes_update_running_mean() {
        let mut perf = StrategyPerformance::default();
        assert_eq!(perf.success_rate(), None);

        perf.record_outcome(true, 5.0, Utc::now()).unwrap();
        assert_eq!(perf.total_runs, 1);
        assert_eq!(perf.successful_picks, 1);
        assert!((perf.avg_return - 5.0).abs() < 1e-9);

        perf.record_outcome(false, -3.0, Utc::now()).unwrap();
        assert_eq!(perf.total_runs, 2);
        assert_eq!(perf.failed_picks, 1);
        assert!((perf.avg_return - 1.0).abs() < 1e-9);
        assert_eq!(perf.success_rate(), Some(0.5));
        assert!(perf.last_run.is_some());
    }

    #[test]
    fn non_finite_return_is_rejected_without_mutation() {
        let mut perf = StrategyPerformance::default();
        assert!(perf.record_outcome(true, f64::INFINITY, Utc::now()).is_err());
        assert_eq!(perf, StrategyPerformance::default());
    }

    #[test]
    fn record_run_does_not_count_picks() {
        let mut perf = StrategyPerformance::default();
        perf.record_run(12, Utc::now());
        assert_eq!(perf.total_runs, 0);
        assert_eq!(perf.last_result_count, 12);
        assert!(perf.last_run.is_some());
    }

    #[test]
    fn more_picks_than_runs_is_invalid() {
        let perf = StrategyPerformance {
            total_runs: 1,
            successful_picks: 1,
            failed_picks: 1,
            ..Default::default()
        };
        assert!(perf.validate().is_err());
    }

    #[test]
    fn legacy_document_with_naive_timestamps_loads() {
        let legacy = serde_json::json!({
            "name": "momentum_long",
            "description": "Small cap gainers",
            "scan_code": "TOP_PERC_GAIN",
            "filters": {"price_min": 2.0, "price_max": 20.0, "volume_min": 500000},
            "bias": "long",
            "style": "momentum",
            "instrument": "STK",
            "location_code": "STK.US.MAJOR",
            "performance": {
                "total_runs": 3,
                "successful_picks": 1,
                "failed_picks": 1,
                "avg_return": 2.5,
                "last_run": "2025-01-15T10:30:00.123456",
                "last_result_count": 12
            },
            "created": "2025-01-10T09:00:00.000001",
            "modified": "2025-01-15T10:30:00.123456",
            "enabled": true,
            "tags": ["momentum", "long"]
        });
        let s: ScreeningStrategy = serde_json::from_value(legacy).unwrap();
        s.validate().unwrap();
        assert_eq!(
            s.performance.last_run.unwrap().to_rfc3339(),
            "2025-01-15T10:30:00.123456+00:00"
        );
        assert_eq!(s.created.to_rfc3339(), "2025-01-10T09:00:00.000001+00:00");
        assert_eq!(s.location_code.as_deref(), Some("STK.US.MAJOR"));

        // Written back as RFC 3339 with the location code kept
        let value = serde_json::to_value(&s).unwrap();
        assert_eq!(value["location_code"], "STK.US.MAJOR");
        assert_eq!(value["performance"]["last_run"], "2025-01-15T10:30:00.123456Z");
    }

    #[test]
    fn invalid_timestamp_is_a_parse_error() {
        let doc = serde_json::json!({
            "name": "bad_time",
            "description": "",
            "scan_code": "HALTED",
            "created": "last tuesday"
        });
        assert!(serde_json::from_value::<ScreeningStrategy>(doc).is_err());
    }

    #[test]
    fn blank_location_code_is_rejected() {
        let err = ScreeningStrategy::builder("blank_loc", "MOST_ACTIVE")
            .location_code("  ")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("location code"));
    }

    #[test]
    fn json_omits_unset_filters_and_applies_defaults() {
        let s = momentum();
        let value = serde_json::to_value(&s).unwrap();
        let filters = value["filters"].as_object().unwrap();
        assert_eq!(filters.len(), 3);
        assert_eq!(value["bias"], "long");
        assert_eq!(value["performance"]["last_run"], serde_json::Value::Null);

        let minimal = serde_json::json!({
            "name": "minimal",
            "description": "",
            "scan_code": "HOT_BY_VOLUME",
        });
        let parsed: ScreeningStrategy = serde_json::from_value(minimal).unwrap();
        assert!(parsed.enabled);
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.style, TradingStyle::Custom);
        assert_eq!(parsed.bias, TradingBias::Neutral);
        assert_eq!(parsed.location_code, None);
        assert!(serde_json::to_value(&parsed)
            .unwrap()
            .get("location_code")
            .is_none());
    }
}
