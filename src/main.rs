//! rsiwatch - headless RSI monitor for Binance USD-M futures
//!
//! Watches the symbols listed in the pairs file, keeps the liquid ones streamed, and posts
//! Telegram alerts when RSI leaves the configured band.
//!
//! # Usage
//! ```sh
//! TELEGRAM_BOT_TOKEN=... TELEGRAM_CHAT_ID=... cargo run --release -- --pairs-file pairs.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use rsiwatch::application::monitoring::MonitorOrchestrator;
use rsiwatch::config::{Config, load_pairs};
use rsiwatch::domain::errors::MonitorError;
use rsiwatch::infrastructure::{BinanceMarketDataService, TelegramNotifier};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "RSI alert monitor for Binance USD-M futures", long_about = None)]
struct Cli {
    /// Pairs file, overrides PAIRS_FILE
    #[arg(short, long)]
    pairs_file: Option<PathBuf>,

    /// Environment file loaded before reading configuration
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // A missing env file is fine, variables may come from the process environment
    let env_loaded = dotenvy::from_path(&cli.env_file).is_ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("rsiwatch {} starting...", env!("CARGO_PKG_VERSION"));
    if !env_loaded {
        info!("No env file at {}, using process environment", cli.env_file.display());
    }

    let config = Config::from_env().context("Failed to load configuration")?;
    let pairs_file = cli.pairs_file.unwrap_or_else(|| config.pairs_file.clone());
    let pairs = load_pairs(&pairs_file)?;
    if pairs.is_empty() {
        warn!("{} lists no trading pairs", pairs_file.display());
    }
    info!(
        "Configuration loaded: {} pairs, RSI({}) band {}..{}, interval {}, volume filter {}",
        pairs.len(),
        config.alerts.period,
        config.alerts.lower_threshold,
        config.alerts.upper_threshold,
        config.monitor.timeframe,
        if config.volume.enabled {
            format!("{} USDT", config.volume.minimum_volume)
        } else {
            "disabled".to_string()
        }
    );

    let market = BinanceMarketDataService::builder()
        .api_key(config.binance.api_key.clone())
        .base_url(config.binance.base_url.clone())
        .ws_url(config.binance.ws_url.clone())
        .build()
        .context("Failed to build Binance market data service")?;
    let notifier = TelegramNotifier::new(&config.telegram);

    let orchestrator = MonitorOrchestrator::new(
        Arc::new(market),
        Arc::new(notifier),
        pairs.into_iter().map(|p| p.symbol).collect(),
        config.alerts.clone(),
        config.volume.clone(),
        config.monitor.clone(),
    );

    let cancel = CancellationToken::new();
    let run = orchestrator.run(cancel.clone());
    tokio::pin!(run);

    info!("Monitor running. Press Ctrl+C to shutdown.");
    let outcome = tokio::select! {
        outcome = &mut run => outcome,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Shutdown signal received. Stopping monitor..."),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
            cancel.cancel();
            run.await
        }
    };

    // Fatal outcomes are reported through the log, then surface as the exit status
    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(MonitorError::Cancelled { phase }) => {
            info!("Shutdown completed during {}", phase);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Monitor stopped: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
