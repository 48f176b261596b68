// Copyright (c) 2026 FundHub Contributors. MIT License.
// See LICENSE for details.

//! # FundHub Node
//!
//! Entry point for the `fundhub-node` binary. Parses CLI arguments,
//! initializes logging and metrics, restores persisted state, and serves the
//! HTTP/JSON-RPC API until shutdown, at which point state is written back.
//!
//! The binary supports two subcommands:
//!
//! - `run`     : start the node
//! - `version` : print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;

use fundhub_protocol::SystemClock;

use cli::{Commands, FundHubCli};
use metrics::NodeMetrics;
use state::NodeRuntime;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = FundHubCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(&args.log_level, args.log_format)?;

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        hub = %args.hub_address,
        state_file = ?args.state_file,
        "starting fundhub-node"
    );

    // --- Hub and ledger ---
    let runtime = NodeRuntime::open(
        args.hub_address,
        args.state_file.as_deref(),
        Arc::new(SystemClock),
    )?;

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    node_metrics
        .projects_registered
        .set(runtime.hub.count_of_projects() as i64);

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            fundhub_protocol::config::PROTOCOL_VERSION,
        ),
        hub: Arc::clone(&runtime.hub),
        ledger: Arc::clone(&runtime.ledger),
        gate: runtime.gate.clone(),
        rpc_timeout: fundhub_protocol::config::RPC_TIMEOUT,
        metrics: Arc::clone(&node_metrics),
        started_at: chrono::Utc::now(),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    // Both servers drain in-flight requests before returning, so every
    // accepted call has finished by the time state is written.
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received, draining in-flight calls");
        let _ = stop_tx.send(true);
    });

    let api_server = axum::serve(api_listener, api_router)
        .with_graceful_shutdown(stopped(stop_rx.clone()));
    let metrics_server = axum::serve(metrics_listener, metrics_router)
        .with_graceful_shutdown(stopped(stop_rx));
    let (api_res, metrics_res) = tokio::join!(api_server, metrics_server);
    if let Err(e) = api_res {
        tracing::error!("API server error: {}", e);
    }
    if let Err(e) = metrics_res {
        tracing::error!("Metrics server error: {}", e);
    }

    // --- Persist ---
    if let Some(path) = &args.state_file {
        runtime.save(path)?;
    }

    tracing::info!("fundhub-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("fundhub-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol     {}", fundhub_protocol::config::PROTOCOL_VERSION);
    println!(
        "snapshot     v{}",
        fundhub_protocol::config::SNAPSHOT_VERSION
    );
}

/// Resolves once shutdown has been requested.
async fn stopped(mut stop: watch::Receiver<bool>) {
    // A dropped sender also ends the wait.
    let _ = stop.wait_for(|stop| *stop).await;
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// If a handler cannot be installed, that signal is never observed; the
/// other one still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
