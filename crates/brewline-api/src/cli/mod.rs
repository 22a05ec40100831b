//! CLI command definitions for the `brewline` binary.
//!
//! `worker` runs an engine with the order workflow registered; every other
//! command is a client of a running worker, reached over HTTP.

pub mod order;
pub mod worker;

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use brewline_infra::remote::client::DEFAULT_SERVER_URL;
use brewline_types::order::{Drink, DrinkSize};

/// Durable coffee orders: submit, watch, cancel, and run workers.
#[derive(Parser)]
#[command(name = "brewline", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Worker URL for client commands.
    #[arg(long, global = true, env = "BREWLINE_SERVER", default_value = DEFAULT_SERVER_URL)]
    pub server: String,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors and results.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a worker: execute orders and serve the engine API.
    Worker(WorkerArgs),

    /// Submit an order and wait for its result.
    Submit(SubmitArgs),

    /// Show the current state of an order.
    Status {
        /// Order id.
        order_id: String,
    },

    /// Request cancellation of an order.
    Cancel {
        /// Order id.
        order_id: String,
    },

    /// Wait for and print the terminal result of an order.
    Result {
        /// Order id.
        order_id: String,
    },
}

#[derive(Args)]
pub struct WorkerArgs {
    /// Address to listen on (overrides `listen_addr` in config.toml).
    #[arg(long)]
    pub listen: Option<String>,

    /// Keep history in memory instead of SQLite.
    #[arg(long)]
    pub memory: bool,

    /// Seed for simulated brew failures.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args)]
pub struct SubmitArgs {
    /// Unique order id.
    #[arg(long)]
    pub order_id: String,

    /// Drink, e.g. LATTE or flat-white.
    #[arg(long)]
    pub drink: Drink,

    /// Size: S, M, or L.
    #[arg(long)]
    pub size: DrinkSize,

    /// Query the order status once right after submitting.
    #[arg(long)]
    pub query: bool,

    /// Send a cancel signal after this many seconds.
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    pub cancel_after: Option<Duration>,
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration '{s}': {e}"))
}
