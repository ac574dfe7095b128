//! Plain-text rendering of screen results and performance records.

use std::fmt::Write;
use strategy_core::{ScreenResult, ScreeningStrategy};

const RULE_WIDTH: usize = 80;

/// Extra columns that usually hold the scan's headline value.
const VALUE_KEYS: [&str; 3] = ["scan_data", "column_value", "last"];

pub fn format_results(strategy: &ScreeningStrategy, results: &[ScreenResult]) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "{} - {} results",
        strategy.name.to_uppercase(),
        results.len()
    );
    if !strategy.description.is_empty() {
        let _ = writeln!(out, "{}", strategy.description);
    }
    let _ = writeln!(
        out,
        "Bias: {} | Style: {} | Scan: {}",
        strategy.bias.as_str().to_uppercase(),
        strategy.style,
        strategy.scan_code
    );
    let _ = writeln!(out, "{}", rule);

    if results.is_empty() {
        let _ = writeln!(out, "No results found");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<6} {:<10} {:<14} {:<12} {}",
        "Rank", "Symbol", "Exchange", "Value", "Company"
    );
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    for result in results {
        let value = VALUE_KEYS
            .iter()
            .find_map(|key| result.extra.get(*key))
            .map(|v| match v.as_str() {
                Some(s) => s.to_string(),
                None => v.to_string(),
            })
            .unwrap_or_else(|| "N/A".to_string());
        let _ = writeln!(
            out,
            "{:<6} {:<10} {:<14} {:<12} {}",
            result.rank,
            result.symbol,
            result.exchange.as_deref().unwrap_or("-"),
            value,
            result.extra_str("company_name").unwrap_or("")
        );
    }
    out
}

pub fn format_performance(strategies: &[ScreeningStrategy]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(out, "STRATEGY PERFORMANCE SUMMARY");
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));

    for strategy in strategies {
        let perf = &strategy.performance;
        let _ = writeln!(out, "\n{}:", strategy.name);
        let _ = writeln!(out, "  Total Runs: {}", perf.total_runs);
        let last_run = perf
            .last_run
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "Never".to_string());
        let _ = writeln!(out, "  Last Run: {}", last_run);
        let _ = writeln!(out, "  Last Results: {}", perf.last_result_count);
        if let Some(rate) = perf.success_rate() {
            let _ = writeln!(out, "  Success Rate: {:.1}%", rate * 100.0);
            let _ = writeln!(out, "  Avg Return: {:.2}%", perf.avg_return);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn strategy() -> ScreeningStrategy {
        ScreeningStrategy::new("momentum_long", "Small cap gainers", "TOP_PERC_GAIN").unwrap()
    }

    #[test]
    fn results_table_lists_each_row() {
        let mut aapl = ScreenResult::new(1, "AAPL");
        aapl.exchange = Some("NASDAQ".to_string());
        aapl.extra.insert("scan_data".into(), json!("+12.5%"));
        aapl.extra.insert("company_name".into(), json!("APPLE INC"));
        let tsla = ScreenResult::new(3, "TSLA");

        let text = format_results(&strategy(), &[aapl, tsla]);
        assert!(text.contains("MOMENTUM_LONG - 2 results"));
        assert!(text.contains("Bias: NEUTRAL | Style: custom | Scan: TOP_PERC_GAIN"));
        let aapl_line = text.lines().find(|l| l.starts_with("1 ")).unwrap();
        assert!(aapl_line.contains("AAPL"));
        assert!(aapl_line.contains("+12.5%"));
        assert!(aapl_line.contains("APPLE INC"));
        let tsla_line = text.lines().find(|l| l.starts_with("3 ")).unwrap();
        assert!(tsla_line.contains("N/A"));
    }

    #[test]
    fn empty_results_say_so() {
        let text = format_results(&strategy(), &[]);
        assert!(text.contains("No results found"));
    }

    #[test]
    fn performance_shows_rate_only_after_picks() {
        let fresh = strategy();
        let mut scored = ScreeningStrategy::new("scored", "", "MOST_ACTIVE").unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap();
        scored.performance.record_outcome(true, 5.0, at).unwrap();
        scored.performance.record_outcome(false, -3.0, at).unwrap();

        let text = format_performance(&[fresh, scored]);
        assert!(text.contains("Last Run: Never"));
        assert!(text.contains("Last Run: 2026-03-02 14:30:00 UTC"));
        assert!(text.contains("Success Rate: 50.0%"));
        assert!(text.contains("Avg Return: 1.00%"));
        assert_eq!(text.matches("Success Rate").count(), 1);
    }
}
