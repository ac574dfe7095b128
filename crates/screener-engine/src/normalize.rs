use gateway_trait::ScanRow;
use serde_json::Value;
use strategy_core::{ExtraFields, ScreenResult};

/// Column names that carry the ticker, in order of preference.
const SYMBOL_KEYS: [&str; 3] = ["symbol", "ticker", "contract_description_1"];

/// Column names that carry the listing exchange, in order of preference.
const EXCHANGE_KEYS: [&str; 4] = [
    "exchange",
    "listing_exchange",
    "primary_exchange",
    "primaryExchange",
];

/// Map raw gateway rows to ranked results.
///
/// Rank is the row's 1-based position in `rows`, so a skipped row leaves a
/// gap. Columns other than the symbol and exchange land in `extra`; nested
/// arrays and objects are kept as compact JSON text.
pub fn normalize_rows(strategy: &str, rows: Vec<ScanRow>, max_results: usize) -> Vec<ScreenResult> {
    let mut results = Vec::with_capacity(rows.len().min(max_results));

    for (index, mut row) in rows.into_iter().enumerate() {
        if results.len() >= max_results {
            break;
        }
        let rank = index + 1;

        let Some(symbol) = take_text(&mut row, &SYMBOL_KEYS) else {
            tracing::warn!("{}: skipping scan row {} without a symbol", strategy, rank);
            continue;
        };
        let exchange = take_text(&mut row, &EXCHANGE_KEYS);

        let extra: ExtraFields = row
            .into_iter()
            .map(|(key, value)| (key, flatten(value)))
            .collect();

        results.push(ScreenResult {
            rank,
            symbol,
            exchange,
            extra,
        });
    }

    results
}

/// Remove and return the first non-blank string under any of `keys`.
fn take_text(row: &mut ScanRow, keys: &[&str]) -> Option<String> {
    let key = keys.iter().find(|k| {
        row.get(**k)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty())
    })?;
    row.remove(*key)
        .and_then(|v| v.as_str().map(|s| s.trim().to_string()))
}

fn flatten(value: Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        scalar => scalar,
    }
}
