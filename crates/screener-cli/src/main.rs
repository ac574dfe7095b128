use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gateway_trait::{AccountMonitor, ScanGateway};
use ibkr_gateway::{IbkrGateway, TradingMode};
use screener_engine::{format_performance, Screener};
use strategy_core::{ScreenerError, ScreeningStrategy, TradingBias, TradingStyle};
use strategy_library::{StrategyFilter, StrategyLibrary};

mod config;
mod screen;

use config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "screener")]
#[command(version)]
#[command(about = "Strategy-driven stock screener for the IBKR Client Portal Gateway", long_about = None)]
struct Cli {
    /// Strategy directory (overrides STRATEGY_DIR)
    #[arg(long, global = true)]
    strategy_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one strategy, or every enabled strategy when no name is given
    Screen {
        name: Option<String>,
    },

    /// List strategies
    List {
        #[arg(long)]
        bias: Option<TradingBias>,

        #[arg(long)]
        style: Option<TradingStyle>,

        #[arg(long)]
        tag: Option<String>,

        /// Only enabled strategies
        #[arg(long)]
        enabled: bool,

        /// Minimum success rate in percent
        #[arg(long)]
        min_success_rate: Option<f64>,
    },

    /// Print a strategy document
    Show { name: String },

    /// Delete a strategy
    Delete { name: String },

    /// Record the outcome of a pick
    Record {
        name: String,

        /// Return of the pick in percent
        #[arg(allow_hyphen_values = true)]
        return_pct: f64,

        /// Mark the pick as failed (default: successful)
        #[arg(long)]
        failed: bool,
    },

    /// Best strategies by success rate
    Top {
        #[arg(long, default_value = "5")]
        limit: usize,

        #[arg(long, default_value = "1")]
        min_runs: u64,
    },

    /// Export strategies to a directory, or to one bundle file with --bundle
    Export {
        path: PathBuf,

        #[arg(long)]
        bundle: bool,
    },

    /// Import a strategy document, a bundle file or a directory of documents
    Import {
        path: PathBuf,

        /// Replace strategies that already exist
        #[arg(long)]
        overwrite: bool,
    },

    /// Add the predefined strategies missing from the library
    Seed,

    /// Show the brokerage account summary
    Account,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(dir) = cli.strategy_dir {
        config.strategy_dir = dir;
    }

    let library = StrategyLibrary::open(&config.strategy_dir)
        .with_context(|| format!("Failed to open strategy library at {}", config.strategy_dir.display()))?;

    match cli.command {
        Commands::Screen { name } => screen(&config, &library, name.as_deref()).await,
        Commands::List {
            bias,
            style,
            tag,
            enabled,
            min_success_rate,
        } => {
            let filter = StrategyFilter {
                bias,
                style,
                enabled: enabled.then_some(true),
                min_success_rate: min_success_rate.map(|pct| pct / 100.0),
                tag,
            };
            print_listing(&library.filter(&filter)?);
            Ok(())
        }
        Commands::Show { name } => {
            let strategy = library.get(&name)?;
            println!("{}", serde_json::to_string_pretty(&strategy)?);
            Ok(())
        }
        Commands::Delete { name } => {
            library.delete(&name)?;
            println!("Deleted '{}'", name);
            Ok(())
        }
        Commands::Record {
            name,
            return_pct,
            failed,
        } => {
            let strategy = library.record_outcome(&name, !failed, return_pct)?;
            print!("{}", format_performance(std::slice::from_ref(&strategy)));
            Ok(())
        }
        Commands::Top { limit, min_runs } => {
            print!("{}", format_performance(&library.top_performing(limit, min_runs)?));
            Ok(())
        }
        Commands::Export { path, bundle } => {
            let count = if bundle {
                library.export_bundle(&path)?
            } else {
                library.export_to(&path)?
            };
            println!("Exported {} strategies to {}", count, path.display());
            Ok(())
        }
        Commands::Import { path, overwrite } => {
            let report = library.import_from(&path, overwrite)?;
            println!("Imported {}/{} strategies", report.imported.len(), report.total());
            for failure in &report.failed {
                println!("  {}: {}", failure.source, failure.reason);
            }
            Ok(())
        }
        Commands::Seed => {
            let written = library.seed_presets()?;
            if written.is_empty() {
                println!("All predefined strategies are already present");
            } else {
                println!("Added: {}", written.join(", "));
            }
            Ok(())
        }
        Commands::Account => account(&config).await,
    }
}

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }
}

async fn connect(config: &AppConfig) -> Result<Arc<IbkrGateway>> {
    if config.ibkr.trading_mode == TradingMode::Live {
        tracing::warn!("LIVE trading mode ({})", config.ibkr.gateway_url);
    }
    let gateway = Arc::new(IbkrGateway::new(config.ibkr.clone())?);
    if let Err(e) = gateway.connect().await {
        eprintln!("Failed to connect to the IBKR gateway at {}.", config.ibkr.gateway_url);
        eprintln!("Please ensure:");
        eprintln!("1. The Client Portal Gateway is running");
        eprintln!("2. You have logged in through its web page");
        eprintln!("3. IBKR_GATEWAY_URL points at it");
        return Err(e).context("Gateway connection failed");
    }
    Ok(gateway)
}

async fn screen(config: &AppConfig, library: &StrategyLibrary, name: Option<&str>) -> Result<()> {
    let strategies = match name {
        Some(name) => match library.get(name) {
            Ok(strategy) => vec![strategy],
            Err(ScreenerError::NotFound(_)) => {
                eprintln!("Strategy '{}' not found. Available strategies:", name);
                for s in library.list()? {
                    eprintln!("  - {}: {}", s.name, s.description);
                }
                bail!("Unknown strategy '{}'", name);
            }
            Err(e) => return Err(e.into()),
        },
        None => library.filter(&StrategyFilter {
            enabled: Some(true),
            ..Default::default()
        })?,
    };
    if strategies.is_empty() {
        println!("No enabled strategies. Run `screener seed` to add the predefined ones.");
        return Ok(());
    }

    tracing::info!("Loaded {} strategies from {}", strategies.len(), library.dir().display());
    let gateway = connect(config).await?;
    let screener = Screener::new(gateway.clone(), config.screener.clone());

    tracing::info!("Running {} strategies", strategies.len());
    let outcomes = screener.run_strategies(&strategies).await;

    let report = screen::summarize(library, &strategies, &outcomes);
    print!("{}", report.output);
    for error in &report.errors {
        eprintln!("{}", error);
    }

    if let Err(e) = gateway.disconnect().await {
        tracing::warn!("Disconnect failed: {}", e);
    }
    if let Some(message) = report.fatal {
        bail!("Screening aborted: {}", message);
    }
    Ok(())
}

async fn account(config: &AppConfig) -> Result<()> {
    let gateway = connect(config).await?;

    let accounts = gateway.accounts().await?;
    println!("Managed accounts: {}", accounts.join(", "));

    let summary = gateway.account_summary(None).await?;
    println!("Account: {} ({})", summary.account, summary.trading_mode);
    for (tag, value) in &summary.values {
        println!("  {:<20} {}", tag, value);
    }
    println!(
        "  Net liquidation ${} | Buying power ${} | Cash ${}",
        summary.net_liquidation_decimal().round_dp(2),
        summary.buying_power_decimal().round_dp(2),
        summary.cash_decimal().round_dp(2)
    );

    gateway.disconnect().await?;
    Ok(())
}

fn print_listing(strategies: &[ScreeningStrategy]) {
    if strategies.is_empty() {
        println!("No strategies");
        return;
    }
    println!(
        "{:<24} {:<8} {:<15} {:<20} {:<8} {}",
        "Name", "Bias", "Style", "Scan", "Enabled", "Success"
    );
    for s in strategies {
        let rate = s
            .performance
            .success_rate()
            .map(|r| format!("{:.1}%", r * 100.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<8} {:<15} {:<20} {:<8} {}",
            s.name,
            s.bias.as_str(),
            s.style.as_str(),
            s.scan_code.as_str(),
            if s.enabled { "yes" } else { "no" },
            rate
        );
    }
}
