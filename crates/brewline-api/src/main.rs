//! Brewline CLI and worker entry point.
//!
//! Binary name: `brewline`
//!
//! `brewline worker` runs the order workflow and serves the engine API;
//! the other commands are clients of a running worker.

mod cli;
mod http;
mod state;

use std::process::ExitCode;

use clap::Parser;

use brewline_core::client::{ClientError, OrderClient};
use brewline_infra::remote::HttpEngineClient;
use brewline_observe::tracing_setup::{init_tracing, shutdown_tracing};

use cli::order::Output;
use cli::{Cli, Commands};

/// Exit status when the engine could not be reached.
const EXIT_TRANSPORT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,brewline=debug",
        _ => "trace",
    };
    if let Err(e) = init_tracing(filter, cli.otel) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    let outcome = run(cli).await;
    shutdown_tracing();

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", console::style("error:").red().bold());
            if is_transport(&err) {
                ExitCode::from(EXIT_TRANSPORT)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let out = Output {
        json: cli.json,
        quiet: cli.quiet,
    };

    let remote = || -> anyhow::Result<cli::order::RemoteClient> {
        Ok(OrderClient::new(HttpEngineClient::new(&cli.server)?))
    };

    match cli.command {
        Commands::Worker(args) => cli::worker::run_worker(args, cli.quiet).await,
        Commands::Submit(args) => cli::order::submit(&remote()?, args, out).await,
        Commands::Status { order_id } => cli::order::status(&remote()?, &order_id, out).await,
        Commands::Cancel { order_id } => cli::order::cancel(&remote()?, &order_id, out).await,
        Commands::Result { order_id } => cli::order::result(&remote()?, &order_id, out).await,
    }
}

fn is_transport(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ClientError>()
            .is_some_and(ClientError::is_transport)
            || cause
                .downcast_ref::<brewline_core::engine::EngineError>()
                .is_some_and(|e| e.is_transport())
    })
}
