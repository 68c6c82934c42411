//! socks2ws - SOCKS5 over WebSocket
//!
//! This is the main entry point for the socks2ws application.

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use socks2ws::config::{load_config, Config, FrontendConfig, RelayConfig};
use socks2ws::{run_frontend, run_relay, Credential};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use url::Url;

/// socks2ws - tunnel SOCKS5 connections over WebSocket
#[derive(Parser, Debug)]
#[command(name = "socks2ws")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long, global = true)]
    json_log: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the local SOCKS5 frontend
    Frontend(FrontendArgs),
    /// Run the WebSocket relay
    Relay(RelayArgs),
}

#[derive(ClapArgs, Debug)]
struct FrontendArgs {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SOCKS5 listen address
    #[arg(long)]
    listen: Option<String>,

    /// Relay WebSocket URL
    #[arg(long)]
    relay_url: Option<Url>,

    /// Shared secret
    #[arg(long, env = "TUNNEL_SECRET", hide_env_values = true)]
    secret: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct RelayArgs {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Relay listen address
    #[arg(long)]
    listen: Option<String>,

    /// Shared secret
    #[arg(long, env = "TUNNEL_SECRET", hide_env_values = true)]
    secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, args.json_log)?;

    info!("socks2ws v{}", socks2ws::VERSION);

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    match args.command {
        Command::Frontend(frontend_args) => {
            let config = frontend_config(frontend_args)?;
            run_frontend(config, shutdown_rx).await
        }
        Command::Relay(relay_args) => {
            let config = relay_config(relay_args)?;
            info!("Listen address: {}", config.listen_addr);
            run_relay(config, shutdown_rx).await
        }
    }
}

/// Load the optional configuration file
fn load_optional_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            let config = load_config(path)?;
            info!("Configuration loaded from: {:?}", path);
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

/// Build the frontend configuration, flags taking precedence over the file
fn frontend_config(args: FrontendArgs) -> Result<FrontendConfig> {
    let file = load_optional_config(args.config.as_ref())?;

    let mut config = match (file.frontend, args.relay_url.clone(), args.secret.clone()) {
        (Some(config), _, _) => config,
        (None, Some(relay_url), Some(secret)) => {
            FrontendConfig::new(relay_url, Credential::new(secret))
        }
        (None, _, _) => anyhow::bail!(
            "frontend needs a [frontend] config section or both --relay-url and --secret"
        ),
    };

    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(relay_url) = args.relay_url {
        config.relay_url = relay_url;
    }
    if let Some(secret) = args.secret {
        config.secret = Credential::new(secret);
    }

    config.validate().context("Invalid frontend configuration")?;
    Ok(config)
}

/// Build the relay configuration, flags taking precedence over the file
fn relay_config(args: RelayArgs) -> Result<RelayConfig> {
    let file = load_optional_config(args.config.as_ref())?;

    let mut config = match (file.relay, args.secret.clone()) {
        (Some(config), _) => config,
        (None, Some(secret)) => RelayConfig::new(Credential::new(secret)),
        (None, None) => {
            anyhow::bail!("relay needs a [relay] config section or --secret")
        }
    };

    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(secret) = args.secret {
        config.secret = Credential::new(secret);
    }

    config.validate().context("Invalid relay configuration")?;
    Ok(config)
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down...");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down...");
                    }
                }
            }
            Err(e) => {
                warn!("Failed to setup SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        // On Windows, only handle Ctrl+C
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down...");
    }
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
