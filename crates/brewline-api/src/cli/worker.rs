//! `brewline worker` - run orders and serve the engine API.

use anyhow::{Context, Result};
use console::style;

use brewline_infra::config::{load_config, resolve_data_dir};
use brewline_types::config::HistoryBackend;

use crate::cli::WorkerArgs;
use crate::http::router::build_router;
use crate::state::AppState;

pub async fn run_worker(args: WorkerArgs, quiet: bool) -> Result<()> {
    let data_dir = resolve_data_dir();
    let mut config = load_config(&data_dir).await;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if args.memory {
        config.history.backend = HistoryBackend::Memory;
    }

    let state = AppState::init(&data_dir, config, args.seed).await?;
    let recovered = state
        .engine
        .recover()
        .await
        .context("failed to recover open orders")?;

    let addr = state.config.listen_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        listen_addr = %addr,
        task_queue = %state.config.task_queue,
        backend = ?state.config.history.backend,
        recovered,
        "worker started"
    );

    if !quiet {
        println!();
        println!(
            "  {} Brewline worker polling {} on {}",
            style("☕").bold(),
            style(&state.config.task_queue).yellow(),
            style(format!("http://{addr}")).cyan()
        );
        if recovered > 0 {
            println!(
                "  {} Resumed {} open order{}",
                style("↻").blue().bold(),
                style(recovered).bold(),
                if recovered == 1 { "" } else { "s" }
            );
        }
        println!("  {}", style("Press Ctrl+C to stop").dim());
    }

    let engine = state.engine.clone();
    let router = build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    engine.shutdown();

    if !quiet {
        println!("\n  Worker stopped.");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
