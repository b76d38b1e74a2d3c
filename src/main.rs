//! Stockwatch
//!
//! Run with: cargo run -- <SYMBOL> <SELL_THRESHOLD> <BUY_THRESHOLD>
//!
//! Example: cargo run -- PETR4 34.50 29.90
//!
//! Environment variables:
//! - STOCKWATCH_TOPOLOGY: two-loop or single-loop (default: two-loop)
//! - STOCKWATCH_MONITOR_INTERVAL_MS: Pause between ticks (default: 5000)
//! - STOCKWATCH_ALERT_THROTTLE_MS: Pause after each alert (default: 200)
//! - STOCKWATCH_PROVIDER: random, brapi or kafka (default: random)
//! - STOCKWATCH_CHANNELS: Delivery order, e.g. "console,smtp" (default: console)
//! - RUST_LOG: Log level (default: stockwatch=info)
//!
//! Ctrl-C stops both loops cooperatively. An aborted pipeline exits non-zero.

use std::sync::Arc;

use clap::Parser;
use stockwatch::app::{AppConfig, AppError};
use stockwatch::params::Parameters;
use stockwatch::pipeline::{LifetimeHandle, Pipeline, Topology};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "stockwatch", about = "Monitor a stock and alert on threshold crossings")]
struct Args {
    /// Symbol to monitor (PETR4, VALE3, ITUB4, MGLU3)
    symbol: String,

    /// Recommend selling above this price
    sell_threshold: String,

    /// Recommend buying below this price
    buy_threshold: String,

    /// Loop topology (overrides STOCKWATCH_TOPOLOGY)
    #[arg(long)]
    topology: Option<Topology>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let params = Arc::new(Parameters::parse(
        &args.symbol,
        &args.sell_threshold,
        &args.buy_threshold,
    )?);

    let mut config = AppConfig::from_env()?;
    if let Some(topology) = args.topology {
        config.pipeline.topology = topology;
    }

    tracing::info!(
        symbol = %params.symbol,
        sell_threshold = %params.sell_threshold,
        buy_threshold = %params.buy_threshold,
        topology = %config.pipeline.topology,
        provider = ?config.provider,
        channels = ?config.channels,
        "Starting stockwatch"
    );

    let lifetime = LifetimeHandle::new();
    let pipeline = Pipeline::new(
        config.pipeline.clone(),
        config.build_monitors(Arc::clone(&params))?,
        config.build_channels()?,
        lifetime.clone(),
    )?;

    // Ctrl-C is a cooperative stop, not an abort
    tokio::spawn({
        let lifetime = lifetime.clone();
        async move {
            tokio::select! {
                _ = lifetime.cancelled() => {}
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                        return;
                    }
                    tracing::info!("Ctrl-C received, stopping");
                    lifetime.cancel();
                }
            }
        }
    });

    let report = pipeline.run().await?;

    if let Some(reason) = report.abort_reason {
        return Err(AppError::Aborted(reason).into());
    }

    Ok(())
}
