//! Stratus Daemon - Control-plane background service
//!
//! This binary runs the control loops that keep the resource store in line
//! with the cloud providers:
//! - The periodic, leader-gated sync scheduler
//! - One recycle-bin loop per configured resource type
//! - The optional Prometheus metrics endpoint
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! It also offers one-shot commands for an on-demand account sync, recycle
//! record recovery and configuration checks.

mod service;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stratus_core::config::{Config, LoggingConfig};
use stratus_core::domain::{AccountId, RecordId};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::service::DaemonService;

#[derive(Debug, Parser)]
#[command(name = "stratusd", version, about = "Stratus cloud resource control plane")]
struct Cli {
    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every control loop until stopped (default)
    Run,
    /// Sync one account now, including vendor-wide resources
    Sync {
        /// Account to sync
        #[arg(long)]
        account: String,
    },
    /// Restore recycled resources before their retention deadline
    Recover {
        /// Recycle record IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Validate the configuration and exit
    CheckConfig,
}

// ============================================================================
// Configuration and tracing
// ============================================================================

/// Loads the configuration from `path`, or the default location
///
/// An explicit path must exist and parse; the default location falls back
/// to built-in defaults.
fn load_config(path: Option<&Path>) -> Result<(Config, PathBuf)> {
    match path {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            Ok((config, path.to_path_buf()))
        }
        None => {
            let path = Config::default_path();
            Ok((Config::load_or_default(&path), path))
        }
    }
}

/// Returns the validation errors of `config` as printable lines
fn validation_report(config: &Config) -> Vec<String> {
    config.validate().iter().map(ToString::to_string).collect()
}

/// Initializes tracing; `RUST_LOG` overrides `logging.level`
fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Commands
// ============================================================================

async fn run(config: Config) -> Result<()> {
    info!("Stratus daemon starting (stratusd)");

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config).await?;
    let result = service.run(shutdown_token).await;

    match &result {
        Ok(()) => info!("Stratus daemon shut down gracefully"),
        Err(e) => error!(error = %format!("{e:#}"), "Stratus daemon exiting with error"),
    }
    result
}

async fn sync(config: Config, account: &str) -> Result<()> {
    let account_id = AccountId::new(account)?;
    let service = DaemonService::new(config).await?;
    let report = service.sync_account(&account_id).await?;

    let summary = serde_json::json!({
        "account_id": account_id.as_str(),
        "scopes_succeeded": report.scopes_succeeded,
        "scopes_failed": report.scopes_failed,
        "leadership_lost": report.leadership_lost,
        "errors": report.errors,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !report.is_clean() {
        anyhow::bail!("Sync of {account_id} finished with problems");
    }
    Ok(())
}

async fn recover(config: Config, ids: &[String]) -> Result<()> {
    let ids = ids
        .iter()
        .map(|id| id.parse::<RecordId>().with_context(|| format!("Invalid record ID: {id}")))
        .collect::<Result<Vec<_>>>()?;

    let service = DaemonService::new(config).await?;
    let recovered = service.recover(&ids).await?;
    println!("Recovered {recovered} recycle record(s)");
    Ok(())
}

fn check_config(config: &Config, path: &Path) -> Result<()> {
    let errors = validation_report(config);
    if errors.is_empty() {
        println!("Configuration OK ({})", path.display());
        return Ok(());
    }
    for line in &errors {
        println!("  {line}");
    }
    anyhow::bail!("{} configuration error(s) in {}", errors.len(), path.display())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, config_path) = load_config(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Commands::Run);

    if let Commands::CheckConfig = command {
        return check_config(&config, &config_path);
    }

    init_tracing(&config.logging);
    info!(config_path = %config_path.display(), "Loaded configuration");

    let errors = validation_report(&config);
    if !errors.is_empty() {
        for line in &errors {
            error!(problem = %line, "Invalid configuration");
        }
        anyhow::bail!("Invalid configuration in {}", config_path.display());
    }

    match command {
        Commands::Run => run(config).await,
        Commands::Sync { account } => sync(config, &account).await,
        Commands::Recover { ids } => recover(config, &ids).await,
        Commands::CheckConfig => Ok(()),
    }
}

// ============================================================================
// Tests
// ============================================================================
