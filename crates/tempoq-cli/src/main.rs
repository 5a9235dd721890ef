//! Tempoq CLI — entry point.
//!
//! # Commands
//!
//! - `tempoq run [--config PATH] [--logs]` — start the scheduler service
//! - `tempoq status [--config PATH]` — query a running scheduler over the
//!   admin socket and print its schedule snapshot

mod status_cmd;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use tempoq_core::config::load_config;
use tempoq_core::transport::zmq::{DealerTransport, RouterTransport};
use tempoq_scheduler::Scheduler;
use tempoq_store::{KeyListStore, RedisStore};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Tempoq — keeper of time for the job-execution platform
#[derive(Parser)]
#[command(name = "tempoq", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the scheduler service
    Run {
        /// Path to a config file (default: ~/.tempoq/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Show the scheduled jobs of a running scheduler
    Status {
        /// Path to a config file (default: ~/.tempoq/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, logs } => {
            init_logging(logs);
            run_service(config).await
        }
        Commands::Status { config } => {
            init_logging(false);
            status_cmd::run(config).await
        }
    }
}

// ─────────────────────────────────────────────
// Run command
// ─────────────────────────────────────────────

async fn run_service(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref());
    info!(broker = %config.connect_addr, "starting scheduler service");

    let store = RedisStore::new(&config.store.url())
        .with_context(|| format!("invalid store URL {}", config.store.url()))?;

    let frontend = DealerTransport::connect(&config.connect_addr)
        .await
        .with_context(|| format!("failed to connect broker socket {}", config.connect_addr))?;
    let admin = RouterTransport::bind(&config.administrative_listen_addr)
        .await
        .with_context(|| {
            format!(
                "failed to bind admin socket {}",
                config.administrative_listen_addr
            )
        })?;

    let mut scheduler = Scheduler::new(
        config,
        Arc::new(store) as Arc<dyn KeyListStore>,
        Box::new(frontend),
        Box::new(admin),
    );
    scheduler.load_jobs().await;
    scheduler.run().await.context("scheduler event loop failed")
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("tempoq=debug,info")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
