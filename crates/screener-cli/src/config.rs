use anyhow::{bail, Context, Result};
use ibkr_gateway::IbkrConfig;
use screener_engine::ScreenerConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ibkr: IbkrConfig,
    pub strategy_dir: PathBuf,
    pub screener: ScreenerConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let ibkr = IbkrConfig::from_vars(&get)?;

        let strategy_dir = match get("STRATEGY_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .context("Cannot locate home directory; set STRATEGY_DIR")?
                .join(".screener")
                .join("strategies"),
        };

        let max_results: usize = get("SCAN_MAX_RESULTS")
            .unwrap_or_else(|| "25".to_string())
            .parse()
            .context("SCAN_MAX_RESULTS must be a positive integer")?;
        let timeout_secs: u64 = get("SCAN_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("SCAN_TIMEOUT_SECS must be an integer")?;
        let max_concurrent_scans: usize = get("SCAN_MAX_CONCURRENT")
            .unwrap_or_else(|| "1".to_string())
            .parse()
            .context("SCAN_MAX_CONCURRENT must be a positive integer")?;
        let pacing_ms: u64 = get("SCAN_PACING_MS")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .context("SCAN_PACING_MS must be an integer")?;

        let config = Self {
            ibkr,
            strategy_dir,
            screener: ScreenerConfig {
                location_code: get("SCAN_LOCATION_CODE")
                    .unwrap_or_else(|| "STK.US.MAJOR".to_string()),
                max_results,
                // 0 disables the engine-side timeout
                scan_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
                max_concurrent_scans,
                pacing: Duration::from_millis(pacing_ms),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.screener.max_results == 0 {
            bail!("SCAN_MAX_RESULTS must be at least 1");
        }
        if self.screener.max_concurrent_scans == 0 {
            bail!("SCAN_MAX_CONCURRENT must be at least 1");
        }
        if self.screener.location_code.trim().is_empty() {
            bail!("SCAN_LOCATION_CODE must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibkr_gateway::TradingMode;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = config_from(&[("STRATEGY_DIR", "/tmp/strategies")]).unwrap();
        assert_eq!(config.strategy_dir, PathBuf::from("/tmp/strategies"));
        assert_eq!(config.screener.location_code, "STK.US.MAJOR");
        assert_eq!(config.screener.max_results, 25);
        assert_eq!(config.screener.scan_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.screener.max_concurrent_scans, 1);
        assert_eq!(config.screener.pacing, Duration::from_secs(3));
        assert_eq!(config.ibkr.trading_mode, TradingMode::Paper);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("STRATEGY_DIR", "/srv/screener"),
            ("SCAN_LOCATION_CODE", "STK.NASDAQ"),
            ("SCAN_MAX_RESULTS", "50"),
            ("SCAN_TIMEOUT_SECS", "0"),
            ("SCAN_MAX_CONCURRENT", "4"),
            ("SCAN_PACING_MS", "0"),
            ("IB_ACCOUNT", "DU7654321"),
        ])
        .unwrap();
        assert_eq!(config.screener.location_code, "STK.NASDAQ");
        assert_eq!(config.screener.max_results, 50);
        assert_eq!(config.screener.scan_timeout, None);
        assert_eq!(config.screener.max_concurrent_scans, 4);
        assert!(config.screener.pacing.is_zero());
        assert_eq!(config.ibkr.account_id.as_deref(), Some("DU7654321"));
    }

    #[test]
    fn invalid_trading_mode_is_rejected() {
        let err = config_from(&[("STRATEGY_DIR", "/tmp/s"), ("TRADING_MODE", "sim")]).unwrap_err();
        assert!(err.to_string().contains("TRADING_MODE"));
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(config_from(&[("STRATEGY_DIR", "/tmp/s"), ("SCAN_MAX_RESULTS", "0")]).is_err());
        assert!(config_from(&[("STRATEGY_DIR", "/tmp/s"), ("SCAN_MAX_CONCURRENT", "0")]).is_err());
        assert!(config_from(&[("STRATEGY_DIR", "/tmp/s"), ("SCAN_PACING_MS", "soon")]).is_err());
    }
}
