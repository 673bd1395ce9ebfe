//! rotorlb - a health-aware round-robin HTTP load balancer
//!
//! Usage:
//!     rotorlb --config <path>
//!
//! See --help for more options.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

use rotorlb::config::{load_config, Config};
use rotorlb::health::HealthMonitor;
use rotorlb::pool::BackendPool;
use rotorlb::proxy::Router;
use rotorlb::server::Listener;
use rotorlb::util::init_logging;

/// A health-aware round-robin HTTP load balancer written in Rust.
#[derive(Parser, Debug)]
#[command(name = "rotorlb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).with_context(|| {
        format!(
            "failed to load configuration from '{}'",
            cli.config.display()
        )
    })?;

    // CLI overrides config
    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);

    init_logging(log_level, &config.log_format);

    if cli.validate {
        info!("configuration is valid");
        println!("Configuration is valid.");
        println!("  Listen: {}", config.listen);
        println!(
            "  Health check: every {}, probe timeout {}",
            humantime::format_duration(config.health_check.interval),
            humantime::format_duration(config.health_check.probe_timeout())
        );
        println!("  Backends: {}", config.backends.len());
        for backend in &config.backends {
            println!("    - {}", backend);
        }
        return Ok(());
    }

    info!(
        config_path = %cli.config.display(),
        listen = %config.listen,
        backends = config.backends.len(),
        "rotorlb starting"
    );

    for backend in &config.backends {
        info!(backend = %backend, "configured backend");
    }

    run(config)
}

/// Run the load balancer with the given configuration.
fn run(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(async { run_async(config).await })
}

/// Async entry point for the load balancer.
async fn run_async(config: Config) -> Result<()> {
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let pool = Arc::new(BackendPool::from_addresses(
        config.backends.iter().copied(),
    ));

    let mut handles = Vec::new();

    // One monitor task per backend; each probes independently.
    for backend in pool.members() {
        let monitor = HealthMonitor::new(
            Arc::clone(backend),
            config.health_check.interval,
            config.health_check.probe_timeout(),
        );
        let shutdown_rx = shutdown_tx.subscribe();

        handles.push(tokio::spawn(async move {
            monitor.run(shutdown_rx).await;
        }));
    }

    let router = Arc::new(Router::new(Arc::clone(&pool)));

    let listener = Listener::bind(config.listen, router)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.listen))?;

    let shutdown_rx = shutdown_tx.subscribe();
    handles.push(tokio::spawn(async move {
        listener.run(shutdown_rx).await;
    }));

    info!("rotorlb is running");
    info!("press Ctrl+C to stop");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("received shutdown signal");
        }
        Err(e) => {
            error!(error = %e, "failed to listen for shutdown signal");
        }
    }

    // Signal the listener and all monitors to shut down.
    let _ = shutdown_tx.send(());

    for handle in handles {
        let _ = handle.await;
    }

    info!("rotorlb shut down complete");
    Ok(())
}
