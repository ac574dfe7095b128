use std::collections::BTreeMap;
use std::fmt::Write;

use screener_engine::{format_performance, format_results, StrategyRun};
use strategy_core::ScreeningStrategy;
use strategy_library::StrategyLibrary;

/// Printable outcome of a screen command.
#[derive(Debug, Default)]
pub struct ScreenReport {
    /// Result tables and the performance summary
    pub output: String,
    /// One line per strategy that failed
    pub errors: Vec<String>,
    /// First failure that should end the process with an error
    pub fatal: Option<String>,
}

/// Record runs and render every strategy of a batch. A failure on one
/// strategy never hides the others.
pub fn summarize(
    library: &StrategyLibrary,
    strategies: &[ScreeningStrategy],
    outcomes: &BTreeMap<String, StrategyRun>,
) -> ScreenReport {
    let mut report = ScreenReport::default();

    for strategy in strategies {
        match outcomes.get(&strategy.name) {
            Some(Ok(results)) => {
                if let Err(e) = library.record_run(&strategy.name, results.len()) {
                    let message = format!("Could not record run for '{}': {}", strategy.name, e);
                    report.fatal.get_or_insert_with(|| message.clone());
                    report.errors.push(message);
                }
                report.output.push_str(&format_results(strategy, results));
            }
            Some(Err(e)) => {
                let message = format!("Error in '{}': {}", strategy.name, e);
                if e.is_fatal() {
                    report.fatal.get_or_insert_with(|| message.clone());
                }
                report.errors.push(message);
            }
            None if !strategy.enabled => {
                let _ = writeln!(
                    report.output,
                    "Strategy '{}' is disabled, skipped",
                    strategy.name
                );
            }
            None => report
                .errors
                .push(format!("No result for '{}'", strategy.name)),
        }
    }

    let refreshed: Vec<ScreeningStrategy> = strategies
        .iter()
        .map(|s| library.get(&s.name).unwrap_or_else(|_| s.clone()))
        .collect();
    let _ = write!(report.output, "\n{}", format_performance(&refreshed));
    report
}
