//! Wicket Node - Main Binary
//!
//! Authentication node core with:
//! - Service registry on memory, sled, or PostgreSQL
//! - Optional registry bootstrap from JSON definitions
//! - Transient session tickets with periodic expiry sweeps

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};
use wicket_node::{validate_directory, NodeConfig, WicketNode};

/// Wicket Node CLI
#[derive(Parser)]
#[command(name = "wicket-node")]
#[command(about = "Wicket authentication node - service registry and session tickets")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/wicket/node.toml", env = "WICKET_CONFIG")]
    config: PathBuf,

    /// Seed the service registry from JSON definitions (overrides config)
    #[arg(long, env = "WICKET_INIT_FROM_JSON")]
    init_from_json: Option<bool>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Parser)]
enum Command {
    /// Bootstrap the registry and serve (default)
    Run,

    /// Check JSON service definitions without touching the registry
    Validate {
        /// Definitions directory (defaults to the configured json_location)
        #[arg(short, long)]
        directory: Option<PathBuf>,
    },

    /// Show node version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Version) => {
            println!("Wicket Node v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(Command::Validate { directory }) => {
            init_logging(if cli.verbose { "debug" } else { "info" });
            let directory = match directory {
                Some(directory) => directory,
                None => NodeConfig::load(&cli.config)?.registry.json_location,
            };
            return validate(directory);
        }
        Some(Command::Run) | None => {}
    }

    let mut config = NodeConfig::load(&cli.config)?;
    if let Some(init_from_json) = cli.init_from_json {
        config.registry.init_from_json = init_from_json;
    }

    let log_level = if cli.verbose { "debug".to_string() } else { config.node.log_level.clone() };
    init_logging(&log_level);

    info!("Starting Wicket Node v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from {:?}", cli.config);

    // Validate configuration
    config.validate()?;

    let mut node = WicketNode::new(config).await?;
    let report = node.bootstrap().await?;
    if let Some(count) = report.cache_count {
        info!(
            "Registry bootstrap persisted {} of {} candidates, {} services active",
            report.persisted.len(),
            report.candidates,
            count
        );
    }

    // Run node with graceful shutdown
    tokio::select! {
        result = node.run() => {
            if let Err(e) = result {
                error!("Node error: {}", e);
                return Err(e);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal (Ctrl+C)");
            node.shutdown().await?;
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal (SIGTERM)");
            node.shutdown().await?;
        }
    }

    info!("Node stopped gracefully");
    Ok(())
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},wicket_registry=debug", level).into()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();
}

/// Report on a definitions directory; fails when any file has a problem
fn validate(directory: PathBuf) -> Result<()> {
    info!("Validating service definitions in {:?}", directory);
    let report = validate_directory(&directory)?;

    for definition in &report.valid {
        info!("  ok       {}", definition);
    }
    for problem in &report.problems {
        warn!("  problem  {}", problem);
    }

    if !report.is_clean() {
        anyhow::bail!(
            "{} of {} definition files have problems",
            report.problems.len(),
            report.problems.len() + report.valid.len()
        );
    }

    info!("All {} service definitions are valid", report.valid.len());
    Ok(())
}

/// Cross-platform shutdown signal handling
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    // On non-Unix systems, only Ctrl+C is supported
    std::future::pending::<()>().await
}
