use crate::models::*;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use gateway_trait::{
    AccountMonitor, AccountSummary, GatewayError, ScanGateway, ScanRequest, ScanRow, SUMMARY_TAGS,
};
use reqwest::{Client, Response, StatusCode};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingMode {
    Paper,
    Live,
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Paper => "paper",
            TradingMode::Live => "live",
        }
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paper" => Ok(TradingMode::Paper),
            "live" => Ok(TradingMode::Live),
            _ => Err(anyhow!("TRADING_MODE must be 'paper' or 'live' (got '{}')", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IbkrConfig {
    /// Client Portal Gateway URL (default: https://localhost:5000)
    pub gateway_url: String,
    /// Account to report on; the first managed account is used when unset
    pub account_id: Option<String>,
    pub trading_mode: TradingMode,
    pub request_timeout: Duration,
}

impl Default for IbkrConfig {
    fn default() -> Self {
        Self {
            gateway_url: "https://localhost:5000".to_string(),
            account_id: None,
            trading_mode: TradingMode::Paper,
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl IbkrConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source (environment, test map, ...).
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let gateway_url = get("IBKR_GATEWAY_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.gateway_url);
        let account_id = get("IB_ACCOUNT").filter(|a| !a.trim().is_empty());
        let trading_mode = match get("TRADING_MODE") {
            Some(mode) => mode.parse()?,
            None => defaults.trading_mode,
        };
        let request_timeout = match get("IBKR_REQUEST_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse()
                    .map_err(|_| anyhow!("IBKR_REQUEST_TIMEOUT_SECS must be an integer"))?,
            ),
            None => defaults.request_timeout,
        };

        Ok(Self {
            gateway_url,
            account_id,
            trading_mode,
            request_timeout,
        })
    }
}

/// Interactive Brokers gateway access through the Client Portal API.
///
/// Requires the IBKR Client Portal Gateway to be running locally with an
/// authenticated session.
/// See: https://www.interactivebrokers.com/en/trading/ib-api.php
pub struct IbkrGateway {
    client: Client,
    config: IbkrConfig,
    connected: AtomicBool,
}

impl IbkrGateway {
    pub fn new(config: IbkrConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(true) // IBKR gateway uses self-signed certs
            .build()?;

        Ok(Self {
            client,
            config,
            connected: AtomicBool::new(false),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(IbkrConfig::from_env()?)
    }

    pub fn config(&self) -> &IbkrConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/api{}", self.config.gateway_url, path)
    }

    /// Map a transport failure, dropping the connected flag when the
    /// gateway itself is unreachable.
    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            if err.is_connect() {
                self.connected.store(false, Ordering::SeqCst);
            }
            GatewayError::Transport(err.to_string())
        }
    }

    /// Turn a non-success response into the matching error.
    async fn check(&self, response: Response, what: &str) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.connected.store(false, Ordering::SeqCst);
            return Err(GatewayError::NotConnected);
        }
        let text = response.text().await.unwrap_or_default();
        Err(GatewayError::Rejected(format!(
            "IBKR {} failed ({}): {}",
            what, status, text
        )))
    }

    async fn auth_status(&self) -> Result<IbkrAuthStatus, GatewayError> {
        let response = self
            .client
            .get(self.url("/iserver/auth/status"))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = self.check(response, "auth status").await?;
        response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }

    async fn default_account(&self) -> Result<String, GatewayError> {
        if let Some(account) = &self.config.account_id {
            return Ok(account.clone());
        }
        self.accounts()
            .await?
            .into_iter()
            .next()
            .ok_or(GatewayError::NoAccounts)
    }
}

#[async_trait]
impl ScanGateway for IbkrGateway {
    async fn connect(&self) -> Result<(), GatewayError> {
        tracing::info!(
            "Connecting to IBKR gateway at {} ({} trading)",
            self.config.gateway_url,
            self.config.trading_mode
        );

        // Keep-alive; also surfaces an unreachable gateway early
        let response = self
            .client
            .post(self.url("/tickle"))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.check(response, "tickle").await?;

        let status = self.auth_status().await?;
        if !status.is_ready() {
            self.connected.store(false, Ordering::SeqCst);
            tracing::warn!(
                "IBKR session not ready (authenticated={}, connected={}, competing={}): {}",
                status.authenticated,
                status.connected,
                status.competing,
                status.message.as_deref().unwrap_or("-")
            );
            return Err(GatewayError::NotConnected);
        }

        // The brokerage session must list accounts before scanner calls are accepted
        self.connected.store(true, Ordering::SeqCst);
        if let Err(e) = self.accounts().await {
            tracing::warn!("IBKR account priming failed: {}", e);
        }

        tracing::info!("Connected to IBKR gateway");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), GatewayError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let response = self
            .client
            .post(self.url("/logout"))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.check(response, "logout").await?;
        tracing::info!("Disconnected from IBKR gateway");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn scan(&self, request: &ScanRequest) -> Result<Vec<ScanRow>, GatewayError> {
        if !self.is_connected() {
            return Err(GatewayError::NotConnected);
        }

        let body = scanner_request(request);
        tracing::debug!("IBKR scanner request: {:?}", body);

        let response = self
            .client
            .post(self.url("/iserver/scanner/run"))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = self.check(response, "scanner run").await?;

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        parse_scanner_rows(payload)
    }

    fn gateway_name(&self) -> &str {
        "ibkr"
    }
}

#[async_trait]
impl AccountMonitor for IbkrGateway {
    async fn accounts(&self) -> Result<Vec<String>, GatewayError> {
        if !self.is_connected() {
            return Err(GatewayError::NotConnected);
        }
        let response = self
            .client
            .get(self.url("/iserver/accounts"))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = self.check(response, "get accounts").await?;
        let accounts: IbkrAccounts = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(accounts.accounts)
    }

    async fn account_summary(&self, account: Option<&str>) -> Result<AccountSummary, GatewayError> {
        if !self.is_connected() {
            return Err(GatewayError::NotConnected);
        }
        let account = match account {
            Some(a) => a.to_string(),
            None => self.default_account().await?,
        };

        let response = self
            .client
            .get(self.url(&format!("/portfolio/{}/summary", account)))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = self.check(response, "account summary").await?;
        let fields: BTreeMap<String, IbkrSummaryField> = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(summary_from_fields(
            account,
            self.config.trading_mode,
            &fields,
        ))
    }
}

fn scanner_request(request: &ScanRequest) -> IbkrScannerRequest {
    IbkrScannerRequest {
        instrument: request.instrument.clone(),
        location: request.location_code.clone(),
        scan_type: request.scan_code.clone(),
        filter: request
            .filters
            .iter()
            .map(|f| IbkrScannerFilter {
                code: f.code.clone(),
                value: f.value,
            })
            .collect(),
    }
}

/// Accepts both the documented `{"contracts": [...]}` envelope and a bare
/// array. Non-object rows are a malformed response.
fn parse_scanner_rows(payload: serde_json::Value) -> Result<Vec<ScanRow>, GatewayError> {
    let (contracts, column) = match payload {
        serde_json::Value::Array(rows) => (rows, None),
        other => {
            let response: IbkrScannerResponse = serde_json::from_value(other)
                .map_err(|e| GatewayError::Rejected(format!("unexpected scanner payload: {}", e)))?;
            (response.contracts, response.scan_data_column_name)
        }
    };

    contracts
        .into_iter()
        .map(|row| match row {
            serde_json::Value::Object(mut map) => {
                if let Some(column) = &column {
                    map.entry("scan_data_column_name")
                        .or_insert_with(|| serde_json::Value::String(column.clone()));
                }
                Ok(map)
            }
            other => Err(GatewayError::Rejected(format!(
                "unexpected scanner row: {}",
                other
            ))),
        })
        .collect()
}

/// The portfolio summary keys are lowercase tag names ("netliquidation").
fn summary_from_fields(
    account: String,
    trading_mode: TradingMode,
    fields: &BTreeMap<String, IbkrSummaryField>,
) -> AccountSummary {
    let values = SUMMARY_TAGS
        .iter()
        .filter_map(|tag| {
            fields
                .get(&tag.to_ascii_lowercase())
                .and_then(IbkrSummaryField::display_value)
                .map(|v| (tag.to_string(), v))
        })
        .collect();

    AccountSummary {
        account,
        trading_mode: trading_mode.to_string(),
        values,
    }
}
