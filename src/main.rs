use std::time::Duration;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use azora_api::config::config;
use azora_api::database::open_store;
use azora_api::services::budget::run_budget_sweep;
use azora_api::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config().clone();
    info!("Starting Azora API in {:?} mode", config.environment);

    let port = config.server.port;
    let sweep_interval = config.budget.sweep_interval_secs;

    let store = open_store(&config.database).await.context("failed to open store")?;
    let state = AppState::new(config, store).context("failed to build Azure client")?;

    if sweep_interval > 0 {
        tokio::spawn(budget_sweep_loop(state.clone(), Duration::from_secs(sweep_interval)));
    }

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Azora API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}

async fn budget_sweep_loop(state: AppState, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately; wait a full period before sweeping
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match run_budget_sweep(&state).await {
            Ok(entries) => info!("Budget sweep checked {} apps", entries.len()),
            Err(e) => error!("Budget sweep failed: {}", e),
        }
    }
}
