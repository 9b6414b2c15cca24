// src/main.rs
use crate::config::{AppConfig, EngineConfig};
use crate::connectors::binance::BinanceGateway;
use crate::core::control::ControlHandle;
use crate::core::engine::Engine;
use crate::storage::position::PositionStore;
use crate::strategies::averager::CostAverager;
use crate::types::EngineSnapshot;
use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing_subscriber::EnvFilter;
use url::Url;

mod config;
mod connectors;
mod console;
mod core;
mod storage;
mod strategies;
mod types;
mod utils;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let app = AppConfig::new().context("configuration")?;
    let _log_guard = init_tracing(&app.log_dir);

    let config = EngineConfig::from_app(&app)?;
    let symbol = config.symbol();

    println!("========================================");
    println!("       THE STACKER BOT - v0.1.0");
    println!("========================================");
    println!("Market:   {symbol}");
    println!("Step:     {} {}", config.step_size, config.base_asset);
    println!("Limit:    {} {}", config.max_volume, config.base_asset);
    println!("Interval: {}s", app.poll_interval_secs);
    println!("========================================");

    let rest_url = Url::parse(&app.rest_url).context("rest_url")?;
    let gateway = BinanceGateway::new(
        app.api_key.clone(),
        app.secret_key.clone(),
        rest_url,
        app.lot_step,
    );
    let store = PositionStore::new(&app.state_file);

    let (command_tx, command_rx) = mpsc::channel(16);
    let snapshot = Arc::new(RwLock::new(EngineSnapshot::initial(config.clone())));
    let handle = ControlHandle::new(command_tx, snapshot.clone(), store.clone());

    let engine = Engine::new(
        config,
        Box::new(gateway),
        store,
        CostAverager,
        command_rx,
        snapshot,
    );
    let engine_task = tokio::spawn(engine.run());

    console::run(handle).await;

    // The console owned the last command sender; with it gone the engine
    // drains its queue and exits on the closed channel.
    engine_task.await.context("engine task")?;

    Ok(())
}

fn init_tracing(log_dir: &str) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "stacker.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    guard
}
