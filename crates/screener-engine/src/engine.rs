use gateway_trait::{GatewayError, ScanFilter, ScanGateway, ScanRequest};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use strategy_core::{ScreenResult, ScreenerError, ScreeningStrategy};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::normalize::normalize_rows;

/// Outcome of one strategy in a batch run.
pub type StrategyRun = Result<Vec<ScreenResult>, ScreenerError>;

#[derive(Debug, Clone)]
pub struct ScreenerConfig {
    /// Market segment for strategies that do not name one, e.g. "STK.US.MAJOR"
    pub location_code: String,
    pub max_results: usize,
    /// Upper bound for a single scan call; `None` leaves it to the gateway
    pub scan_timeout: Option<Duration>,
    /// Scans in flight at once during a batch run
    pub max_concurrent_scans: usize,
    /// Delay between scans when a batch runs sequentially
    pub pacing: Duration,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            location_code: "STK.US.MAJOR".to_string(),
            max_results: 25,
            scan_timeout: Some(Duration::from_secs(30)),
            max_concurrent_scans: 1,
            pacing: Duration::from_secs(3),
        }
    }
}

/// Runs screening strategies against a scan gateway.
///
/// The engine never touches performance records; callers persist run
/// statistics through the library.
#[derive(Clone)]
pub struct Screener {
    gateway: Arc<dyn ScanGateway>,
    config: ScreenerConfig,
}

impl Screener {
    pub fn new(gateway: Arc<dyn ScanGateway>, config: ScreenerConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    /// Translate a strategy into a scanner request. Market cap bounds are
    /// sent in millions. The strategy's own location code wins over the
    /// configured one.
    pub fn build_request(&self, strategy: &ScreeningStrategy) -> ScanRequest {
        let f = &strategy.filters;
        let bounds = [
            ("priceAbove", f.price_min),
            ("priceBelow", f.price_max),
            ("volumeAbove", f.volume_min.map(|v| v as f64)),
            ("volumeBelow", f.volume_max.map(|v| v as f64)),
            ("avgVolumeAbove", f.avg_volume_min.map(|v| v as f64)),
            ("marketCapAbove1e6", f.market_cap_min.map(|v| v / 1e6)),
            ("marketCapBelow1e6", f.market_cap_max.map(|v| v / 1e6)),
            ("changePercAbove", f.price_change_min),
            ("changePercBelow", f.price_change_max),
            ("impVolatAbove", f.volatility_min),
            ("impVolatBelow", f.volatility_max),
        ];

        ScanRequest {
            instrument: strategy.instrument.clone(),
            location_code: strategy
                .location_code
                .clone()
                .unwrap_or_else(|| self.config.location_code.clone()),
            scan_code: strategy.scan_code.as_str().to_string(),
            filters: bounds
                .into_iter()
                .filter_map(|(code, value)| value.map(|v| ScanFilter::new(code, v)))
                .collect(),
            max_results: self.config.max_results,
        }
    }

    /// Run one strategy. Disabled strategies yield no results and issue no
    /// scan.
    pub async fn run_strategy(
        &self,
        strategy: &ScreeningStrategy,
    ) -> Result<Vec<ScreenResult>, ScreenerError> {
        if !strategy.enabled {
            tracing::debug!("Strategy '{}' is disabled, skipping", strategy.name);
            return Ok(Vec::new());
        }
        if !self.gateway.is_connected() {
            return Err(ScreenerError::ConnectionRequired);
        }

        let request = self.build_request(strategy);
        tracing::info!(
            "🔍 Running '{}' on {}: {} with {} filters",
            strategy.name,
            self.gateway.gateway_name(),
            request.scan_code,
            request.filters.len()
        );

        let scan = self.gateway.scan(&request);
        let outcome = match self.config.scan_timeout {
            Some(limit) => match tokio::time::timeout(limit, scan).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(ScreenerError::Scan {
                        strategy: strategy.name.clone(),
                        message: format!("scan timed out after {}s", limit.as_secs_f64()),
                    })
                }
            },
            None => scan.await,
        };

        let rows = outcome.map_err(|e| match e {
            GatewayError::NotConnected => ScreenerError::ConnectionRequired,
            other => ScreenerError::Scan {
                strategy: strategy.name.clone(),
                message: other.to_string(),
            },
        })?;

        let received = rows.len();
        let results = normalize_rows(&strategy.name, rows, self.config.max_results);
        tracing::info!(
            "✅ '{}': {} results ({} rows received)",
            strategy.name,
            results.len(),
            received
        );
        Ok(results)
    }

    /// Run a batch, isolating failures per strategy. Disabled strategies are
    /// left out of the map.
    ///
    /// With `max_concurrent_scans <= 1` the strategies run in order with
    /// `pacing` between scans; otherwise they are dispatched concurrently.
    /// Each result is keyed by the task that issued its scan, so completion
    /// order does not matter.
    pub async fn run_strategies(
        &self,
        strategies: &[ScreeningStrategy],
    ) -> BTreeMap<String, StrategyRun> {
        let enabled: Vec<&ScreeningStrategy> = strategies.iter().filter(|s| s.enabled).collect();
        if enabled.len() < strategies.len() {
            tracing::info!(
                "Skipping {} disabled strategies",
                strategies.len() - enabled.len()
            );
        }

        if self.config.max_concurrent_scans <= 1 {
            self.run_sequential(&enabled).await
        } else {
            self.run_concurrent(&enabled).await
        }
    }

    async fn run_sequential(&self, strategies: &[&ScreeningStrategy]) -> BTreeMap<String, StrategyRun> {
        let mut results = BTreeMap::new();
        for (i, strategy) in strategies.iter().enumerate() {
            if i > 0 && !self.config.pacing.is_zero() {
                tracing::debug!("Waiting {:?} before next scan", self.config.pacing);
                tokio::time::sleep(self.config.pacing).await;
            }
            let outcome = self.run_strategy(strategy).await;
            log_failure(&strategy.name, &outcome);
            results.insert(strategy.name.clone(), outcome);
        }
        results
    }

    async fn run_concurrent(&self, strategies: &[&ScreeningStrategy]) -> BTreeMap<String, StrategyRun> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_scans));
        let mut tasks = JoinSet::new();

        for strategy in strategies {
            let sem = Arc::clone(&semaphore);
            let screener = self.clone();
            let strategy = (*strategy).clone();
            tasks.spawn(async move {
                let outcome = match sem.acquire_owned().await {
                    Ok(_permit) => screener.run_strategy(&strategy).await,
                    Err(_) => Err(ScreenerError::Scan {
                        strategy: strategy.name.clone(),
                        message: "scan dispatcher closed".to_string(),
                    }),
                };
                (strategy.name, outcome)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, outcome)) => {
                    log_failure(&name, &outcome);
                    results.insert(name, outcome);
                }
                Err(e) => tracing::error!("Scan task error: {}", e),
            }
        }

        // A task that panicked still owes its strategy an entry
        for strategy in strategies {
            results
                .entry(strategy.name.clone())
                .or_insert_with(|| {
                    Err(ScreenerError::Scan {
                        strategy: strategy.name.clone(),
                        message: "scan task aborted".to_string(),
                    })
                });
        }
        results
    }
}

fn log_failure(name: &str, outcome: &StrategyRun) {
    if let Err(e) = outcome {
        tracing::warn!("Strategy '{}' failed: {}", name, e);
    }
}
