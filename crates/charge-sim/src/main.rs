mod app_state;
mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use charge_api::create_app;
use charge_engine::SimulatorConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::{Fixtures, read_json};

/// Command line arguments for the charge-sim server
#[derive(Parser, Debug)]
#[command(name = "charge-sim")]
#[command(about = "EV charging session tick simulator")]
struct Args {
    /// Path to the simulator configuration JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to a JSON file with stations, ports and sessions to seed the store with
    #[arg(short, long)]
    fixtures: Option<PathBuf>,

    /// Port to bind the server to
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Seconds between two scheduled invocations
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
    interval_secs: u64,

    /// Run a single invocation, print its summary and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config: SimulatorConfig = match &args.config {
        Some(path) => read_json(path).await?,
        None => SimulatorConfig::default(),
    };
    tracing::info!(
        "Ticking {} x {}s per invocation against '{}' and '{}'",
        config.tick.ticks_per_invocation,
        config.tick.tick_duration_seconds,
        config.sessions_table,
        config.stations_table
    );

    let fixtures: Fixtures = match &args.fixtures {
        Some(path) => read_json(path).await?,
        None => Fixtures::default(),
    };

    let state = AppState::new(config, &fixtures).await?;

    if args.once {
        let summary = state.runner.invoke().await?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let scheduler = {
        let runner = state.runner.clone();
        let cadence = Duration::from_secs(args.interval_secs);
        tokio::spawn(async move { runner.run_every(cadence).await })
    };

    let app = create_app(state.runner.clone());

    let bind_addr = format!("0.0.0.0:{}", args.port);
    tracing::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    scheduler.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
