// src/main.rs

//! The main entry point for the key-value server application.

use anyhow::{Result, anyhow};
use kvserver::config::Config;
use kvserver::{MemoryStore, Server};
use std::env;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

async fn run_app() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("kvserver version {VERSION}");
        return Ok(());
    }

    // An explicit --config must exist; the implicit default may be absent.
    let config_flag = args
        .iter()
        .position(|arg| arg == "--config")
        .map(|i| args.get(i + 1).map(|s| s.as_str()));
    let mut config = match config_flag {
        Some(Some(path)) => Config::from_file(path),
        Some(None) => {
            eprintln!("--config flag requires a value");
            std::process::exit(1);
        }
        None => Config::from_file_or_default("config.toml"),
    }
    .unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e:#}");
        std::process::exit(1);
    });

    if let Some(port_index) = args.iter().position(|arg| arg == "--port") {
        match args.get(port_index + 1).map(|s| s.parse::<u16>()) {
            Some(Ok(port)) => config.port = port,
            Some(Err(_)) => {
                eprintln!("Invalid port number: {}", args[port_index + 1]);
                std::process::exit(1);
            }
            None => {
                eprintln!("--port flag requires a value");
                std::process::exit(1);
            }
        }
    }

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact() // Use the compact, single-line format.
                .with_ansi(true),
        )
        .init();

    let server = match Server::start(config, MemoryStore::new()).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server could not be started: {}", e);
            return Err(e.into());
        }
    };
    info!("Started key-value server on {}", server.local_addr());

    wait_for_shutdown_signal().await?;
    server.close().await;
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to register SIGINT handler: {}", e))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to register SIGTERM handler: {}", e))?;

    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
        _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
    }
    Ok(())
}
