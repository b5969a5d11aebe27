mod backend;
mod config;
mod daemon;

use anyhow::{Context, Result};
use log::{error, info};
use std::fs;
use tokio::signal::unix::{signal, SignalKind};

const DEFAULT_CONFIG: &str = "/etc/soft-spi/config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logger();

    // Parse command line arguments
    let mut config_path = DEFAULT_CONFIG.to_string();
    let mut once = false;
    for arg in std::env::args().skip(1) {
        if arg == "--once" {
            once = true;
        } else {
            config_path = arg;
        }
    }

    info!("Soft SPI starting...");
    info!("Loading configuration from: {}", config_path);

    let config = load_config(&config_path)?;
    info!("Configuration loaded successfully");

    let mut daemon = daemon::Daemon::new(config)?;

    if once {
        daemon.run_once().await?;
        info!("Single pass complete");
        return Ok(());
    }

    // Setup signal handling via tokio
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to setup SIGHUP handler")?;

    info!("Daemon started successfully");

    loop {
        tokio::select! {
            result = daemon.poll() => {
                if let Err(e) = result {
                    error!("Daemon poll error: {}", e);
                    return Err(e);
                }
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully");
                break;
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading configuration");
                let new_config = load_config(&config_path)?;
                daemon.reload_config(new_config).await?;
            }
        }
    }

    info!("Soft SPI shutdown complete");
    Ok(())
}

fn load_config(path: &str) -> Result<config::Config> {
    let content =
        fs::read_to_string(path).context(format!("Failed to read config file: {}", path))?;
    config::Config::from_yaml(&content)
}

fn init_logger() {
    // Use `env_logger` for logging. Systemd/journald will capture stdout/stderr.
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();
}
