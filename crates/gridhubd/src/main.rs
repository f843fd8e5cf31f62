//! gridhubd — the GridHub daemon.
//!
//! Single binary that assembles the hub-side subsystems:
//! - Node table + in-process session pool
//! - Liveness monitor (one poll loop per node)
//! - Quarantine coordinator (event handling, pool removal, intake)
//! - Drain-restart workflow
//! - Admin REST API
//!
//! # Usage
//!
//! ```text
//! gridhubd run --config /etc/gridhub/gridhub.toml --port 4444
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing::info;

use gridhub_api::{ApiState, build_router};
use gridhub_core::{GridConfig, NodeConfig};
use gridhub_health::{HttpHealthProbe, LivenessMonitor};
use gridhub_quarantine::{DrainAndRestartWorkflow, QuarantineCoordinator};
use gridhub_registry::{InMemoryPool, NodeTable};

#[derive(Parser)]
#[command(name = "gridhubd", about = "GridHub daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the hub.
    Run {
        /// Path to gridhub.toml. Defaults apply if omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on, overriding the config file.
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gridhubd=debug,gridhub=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, port } => run(config, port).await,
    }
}

async fn run(config_path: Option<PathBuf>, port_override: Option<u16>) -> anyhow::Result<()> {
    info!("GridHub daemon starting");

    let config = match &config_path {
        Some(path) => GridConfig::from_file(path)?,
        None => GridConfig::default(),
    };
    let port = port_override.unwrap_or(config.server.port);

    // ── Assemble subsystems ────────────────────────────────────

    let nodes = Arc::new(NodeTable::new());
    let pool = Arc::new(InMemoryPool::new(nodes.clone()));

    let (events_tx, events_rx) = mpsc::channel(256);
    let monitor = Arc::new(LivenessMonitor::new(
        nodes.clone(),
        Arc::new(HttpHealthProbe::default()),
        events_tx,
    ));
    info!("liveness monitor initialized");

    let coordinator = Arc::new(QuarantineCoordinator::new(
        nodes.clone(),
        pool.clone(),
        monitor.clone(),
    ));
    let workflow = Arc::new(DrainAndRestartWorkflow::new(
        nodes.clone(),
        pool.clone(),
        config.drain.clone(),
        config.restart_policy.clone(),
    ));
    info!("quarantine coordinator initialized");

    // Statically configured nodes. An entry that carries no overrides
    // inherits the [node_defaults] section.
    for mut registration in config.nodes {
        if registration.config == NodeConfig::default() {
            registration.config = config.node_defaults.clone();
        }
        let node_id = registration.node_id.clone();
        monitor.register_node(registration).await?;
        info!(%node_id, "configured node registered");
    }

    // ── Start background tasks ─────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let coordinator_task = coordinator.clone();
    let coordinator_handle =
        tokio::spawn(async move { coordinator_task.run(events_rx, shutdown_rx).await });

    // ── Serve the admin API ────────────────────────────────────

    let router = build_router(ApiState {
        nodes,
        monitor: monitor.clone(),
        coordinator,
        workflow,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "admin api listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    // ── Graceful shutdown ──────────────────────────────────────

    let _ = shutdown_tx.send(true);
    let _ = coordinator_handle.await;
    monitor.stop_all().await;
    info!("GridHub daemon stopped");
    Ok(())
}
