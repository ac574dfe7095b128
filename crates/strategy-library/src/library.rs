use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use strategy_core::{
    validate_name, ScreenerError, ScreeningStrategy, TradingBias, TradingStyle,
};

use crate::presets::predefined_strategies;
use crate::storage::{document_path, is_document, read_document, read_json, write_json};

/// Predicate for [`StrategyLibrary::filter`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct StrategyFilter {
    pub bias: Option<TradingBias>,
    pub style: Option<TradingStyle>,
    pub enabled: Option<bool>,
    /// Minimum success rate as a fraction; strategies without recorded picks
    /// never satisfy it
    pub min_success_rate: Option<f64>,
    pub tag: Option<String>,
}

impl StrategyFilter {
    pub fn matches(&self, strategy: &ScreeningStrategy) -> bool {
        if self.bias.is_some_and(|b| b != strategy.bias) {
            return false;
        }
        if self.style.is_some_and(|s| s != strategy.style) {
            return false;
        }
        if self.enabled.is_some_and(|e| e != strategy.enabled) {
            return false;
        }
        if let Some(min) = self.min_success_rate {
            match strategy.performance.success_rate() {
                Some(rate) if rate >= min => {}
                _ => return false,
            }
        }
        if let Some(tag) = &self.tag {
            if !strategy.has_tag(tag) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportFailure {
    /// File path or bundle key the entry came from
    pub source: String,
    pub reason: String,
}

/// Outcome of a bulk import. Bad entries are reported, never fatal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub imported: Vec<String>,
    pub failed: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.imported.len() + self.failed.len()
    }

    fn fail(&mut self, source: impl Into<String>, reason: impl ToString) {
        self.failed.push(ImportFailure {
            source: source.into(),
            reason: reason.to_string(),
        });
    }
}

/// Durable mapping from strategy name to [`ScreeningStrategy`].
///
/// Read-modify-write operations (`record_outcome`, `record_run`) take no
/// lock; two writers updating the same name can lose an update.
#[derive(Debug, Clone)]
pub struct StrategyLibrary {
    dir: PathBuf,
}

impl StrategyLibrary {
    /// Open the library rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ScreenerError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| ScreenerError::storage(&dir, e))?;
        tracing::debug!("Strategy library at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, ScreenerError> {
        validate_name(name)?;
        Ok(document_path(&self.dir, name))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// All readable strategies ordered by name. Unreadable or invalid
    /// documents are logged and skipped.
    pub fn list(&self) -> Result<Vec<ScreeningStrategy>, ScreenerError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| ScreenerError::storage(&self.dir, e))?;

        let mut strategies = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {}: {}", self.dir.display(), e);
                    continue;
                }
            };
            if !is_document(&path) {
                continue;
            }

            match read_document(&path) {
                Ok(strategy) => {
                    let stem = path.file_stem().and_then(|s| s.to_str());
                    if stem != Some(strategy.name.as_str()) {
                        tracing::warn!(
                            "Skipping {}: document name '{}' does not match file name",
                            path.display(),
                            strategy.name
                        );
                        continue;
                    }
                    strategies.push(strategy);
                }
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        strategies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(strategies)
    }

    pub fn names(&self) -> Result<Vec<String>, ScreenerError> {
        Ok(self.list()?.into_iter().map(|s| s.name).collect())
    }

    pub fn get(&self, name: &str) -> Result<ScreeningStrategy, ScreenerError> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(ScreenerError::NotFound(name.to_string()));
        }
        read_document(&path)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn len(&self) -> Result<usize, ScreenerError> {
        Ok(self.list()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ScreenerError> {
        Ok(self.len()? == 0)
    }

    pub fn filter(&self, filter: &StrategyFilter) -> Result<Vec<ScreeningStrategy>, ScreenerError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect())
    }

    pub fn by_tag(&self, tag: &str) -> Result<Vec<ScreeningStrategy>, ScreenerError> {
        self.filter(&StrategyFilter {
            tag: Some(tag.to_string()),
            ..Default::default()
        })
    }

    /// Best strategies by success rate, restricted to those with at least
    /// `min_runs` runs and one recorded pick. Ties are broken by name.
    pub fn top_performing(
        &self,
        limit: usize,
        min_runs: u64,
    ) -> Result<Vec<ScreeningStrategy>, ScreenerError> {
        let mut ranked: Vec<(f64, ScreeningStrategy)> = self
            .list()?
            .into_iter()
            .filter(|s| s.performance.total_runs >= min_runs)
            .filter_map(|s| s.performance.success_rate().map(|rate| (rate, s)))
            .collect();

        ranked.sort_by(|(ra, a), (rb, b)| {
            rb.partial_cmp(ra)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        ranked.truncate(limit);
        Ok(ranked.into_iter().map(|(_, s)| s).collect())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Validate, stamp `modified` and write the document, replacing any
    /// previous version.
    pub fn save(&self, strategy: &mut ScreeningStrategy) -> Result<(), ScreenerError> {
        strategy.validate()?;
        let path = self.path_for(&strategy.name)?;
        strategy.touch();
        write_json(&path, strategy)?;
        tracing::debug!("Saved strategy '{}'", strategy.name);
        Ok(())
    }

    /// Like [`save`](Self::save) but refuses to replace an existing strategy.
    pub fn create(&self, strategy: &mut ScreeningStrategy) -> Result<(), ScreenerError> {
        if self.contains(&strategy.name) {
            return Err(ScreenerError::AlreadyExists(strategy.name.clone()));
        }
        self.save(strategy)?;
        tracing::info!("Created strategy '{}'", strategy.name);
        Ok(())
    }

    /// Remove a strategy. Deleting an absent name is a `NotFound` error.
    pub fn delete(&self, name: &str) -> Result<(), ScreenerError> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(ScreenerError::NotFound(name.to_string()));
        }
        fs::remove_file(&path).map_err(|e| ScreenerError::storage(&path, e))?;
        tracing::info!("Deleted strategy '{}'", name);
        Ok(())
    }

    /// Fold a pick outcome into the strategy's performance and persist it.
    pub fn record_outcome(
        &self,
        name: &str,
        successful: bool,
        return_pct: f64,
    ) -> Result<ScreeningStrategy, ScreenerError> {
        let mut strategy = self.get(name)?;
        strategy
            .performance
            .record_outcome(successful, return_pct, Utc::now())?;
        self.save(&mut strategy)?;
        tracing::info!(
            "Recorded {} outcome for '{}' ({:+.2}%)",
            if successful { "successful" } else { "failed" },
            name,
            return_pct
        );
        Ok(strategy)
    }

    /// Stamp a completed screen (time and result count) and persist it.
    pub fn record_run(
        &self,
        name: &str,
        result_count: usize,
    ) -> Result<ScreeningStrategy, ScreenerError> {
        let mut strategy = self.get(name)?;
        strategy.performance.record_run(result_count, Utc::now());
        self.save(&mut strategy)?;
        Ok(strategy)
    }

    /// Write the predefined strategies that are not present yet. Returns the
    /// names written.
    pub fn seed_presets(&self) -> Result<Vec<String>, ScreenerError> {
        let mut written = Vec::new();
        for mut preset in predefined_strategies()? {
            if self.contains(&preset.name) {
                continue;
            }
            self.save(&mut preset)?;
            written.push(preset.name);
        }
        if !written.is_empty() {
            tracing::info!("Seeded {} predefined strategies", written.len());
        }
        Ok(written)
    }

    // -----------------------------------------------------------------------
    // Import / export
    // -----------------------------------------------------------------------

    /// Copy every strategy into `dir` as individual documents.
    pub fn export_to(&self, dir: &Path) -> Result<usize, ScreenerError> {
        let strategies = self.list()?;
        for strategy in &strategies {
            write_json(&document_path(dir, &strategy.name), strategy)?;
        }
        tracing::info!("Exported {} strategies to {}", strategies.len(), dir.display());
        Ok(strategies.len())
    }

    /// Write all strategies into one JSON object keyed by name.
    pub fn export_bundle(&self, file: &Path) -> Result<usize, ScreenerError> {
        let bundle: BTreeMap<String, ScreeningStrategy> = self
            .list()?
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect();
        write_json(file, &bundle)?;
        tracing::info!("Exported {} strategies to {}", bundle.len(), file.display());
        Ok(bundle.len())
    }

    /// Import from a directory of documents, a single document or a bundle.
    ///
    /// Each entry is validated before it is written. Existing strategies are
    /// only replaced when `overwrite` is set.
    pub fn import_from(&self, path: &Path, overwrite: bool) -> Result<ImportReport, ScreenerError> {
        let mut report = ImportReport::default();

        if path.is_dir() {
            let entries = fs::read_dir(path).map_err(|e| ScreenerError::storage(path, e))?;
            let mut files: Vec<PathBuf> = entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| is_document(p))
                .collect();
            files.sort();

            for file in files {
                let source = file.display().to_string();
                match read_json(&file) {
                    Ok(value) => self.import_value(&source, value, overwrite, &mut report),
                    Err(e) => report.fail(source, e),
                }
            }
        } else {
            let value = read_json(path)?;
            self.import_value(&path.display().to_string(), value, overwrite, &mut report);
        }

        tracing::info!(
            "Imported {}/{} strategies from {}",
            report.imported.len(),
            report.total(),
            path.display()
        );
        for failure in &report.failed {
            tracing::warn!("Import of {} failed: {}", failure.source, failure.reason);
        }
        Ok(report)
    }

    /// An object whose `name` is a string is one document; any other object
    /// is a bundle of documents keyed by name (bundle values are objects, even
    /// for a strategy called "name").
    fn import_value(&self, source: &str, value: Value, overwrite: bool, report: &mut ImportReport) {
        match value {
            Value::Object(map) if map.get("name").is_some_and(Value::is_string) => {
                self.import_one(source.to_string(), Value::Object(map), overwrite, report)
            }
            Value::Object(bundle) => {
                for (key, doc) in bundle {
                    self.import_one(format!("{}#{}", source, key), doc, overwrite, report);
                }
            }
            other => report.fail(
                source,
                format!("expected a strategy object or bundle, found {}", json_kind(&other)),
            ),
        }
    }

    fn import_one(&self, source: String, value: Value, overwrite: bool, report: &mut ImportReport) {
        let mut strategy: ScreeningStrategy = match serde_json::from_value(value) {
            Ok(s) => s,
            Err(e) => return report.fail(source, e),
        };
        if let Err(e) = strategy.validate() {
            return report.fail(source, e);
        }
        if !overwrite && self.contains(&strategy.name) {
            return report.fail(source, ScreenerError::AlreadyExists(strategy.name));
        }
        match self.save(&mut strategy) {
            Ok(()) => report.imported.push(strategy.name),
            Err(e) => report.fail(source, e),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
