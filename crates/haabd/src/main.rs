//! haabd — the Haab daemon.
//!
//! Single binary that assembles the Haab subsystems:
//! - Application record store (redb)
//! - Docker runtime client (constructed once, injected everywhere)
//! - Deployment orchestrator
//! - REST API + WebSocket log relay
//!
//! # Usage
//!
//! ```text
//! haabd serve --port 8080 --data-dir /var/lib/haab
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use haab_core::HaabConfig;

#[derive(Parser)]
#[command(name = "haabd", about = "Haab single-host deployment daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon: API server plus orchestrator over the local Docker daemon.
    Serve {
        /// Path to haab.toml; defaults apply if the file does not exist.
        #[arg(long, default_value = "haab.toml")]
        config: PathBuf,

        /// Port to listen on (overrides the config file).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state (overrides the config file).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,haabd=debug,haab=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
        } => {
            let mut config = HaabConfig::load_or_default(&config)?;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }
            serve(config).await
        }
    }
}

async fn serve(config: HaabConfig) -> anyhow::Result<()> {
    info!("Haab daemon starting");

    std::fs::create_dir_all(&config.server.data_dir)?;
    let db_path = config.server.data_dir.join("haab.redb");

    // ── Assemble subsystems ────────────────────────────────────

    let store = haab_state::RecordStore::open(&db_path)?;
    info!(path = ?db_path, "record store opened");

    let runtime = Arc::new(haab_runtime::DockerRuntime::connect(
        config.docker.stop_timeout_secs,
    )?);
    info!("docker runtime client connected");

    let orchestrator =
        haab_orchestrator::Orchestrator::new(store, runtime, &config.docker);

    // ── Start API server ───────────────────────────────────────

    let router = haab_api::build_router(orchestrator);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
        })
        .await?;

    info!("Haab daemon stopped");
    Ok(())
}
