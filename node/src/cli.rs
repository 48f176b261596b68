//! # CLI Interface
//!
//! Defines the command-line argument structure for `fundhub-node` using
//! `clap` derive. Supports two subcommands: `run` and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use fundhub_protocol::config::{DEFAULT_HUB_ADDRESS, DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT};
use fundhub_protocol::Address;

use crate::logging::LogFormat;

/// FundHub reference node.
///
/// Hosts a single funding hub over an in-memory ledger, serves the JSON-RPC
/// API, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "fundhub-node",
    about = "FundHub crowdfunding node",
    version,
    propagate_version = true
)]
pub struct FundHubCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the JSON-RPC and REST API.
    #[arg(long, env = "FUNDHUB_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "FUNDHUB_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Address of the hub. Project addresses are derived from it.
    ///
    /// Ignored when a state file is loaded; the snapshot's hub wins.
    #[arg(long, env = "FUNDHUB_HUB_ADDRESS", default_value = DEFAULT_HUB_ADDRESS)]
    pub hub_address: Address,

    /// JSON snapshot loaded on start (if present) and written on shutdown.
    #[arg(long, env = "FUNDHUB_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Log output format.
    #[arg(long, env = "FUNDHUB_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(
        long,
        env = "FUNDHUB_LOG_LEVEL",
        default_value = "fundhub_node=info,fundhub_contracts=info,fundhub_protocol=info,tower_http=debug"
    )]
    pub log_level: String,
}
