//! Wallet Ledger server
//!
//! Serves wallet deposits, withdrawals and balance reads over HTTP.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --listen 127.0.0.1:8080 --data-dir ./data
//! cargo run -- --workers 8 --max-attempts 5 --lock-timeout-ms 500
//! cargo run -- --log-format json --record-history
//! ```
//!
//! Options may also be given through environment variables or a `config.env`
//! file in the working directory. Command-line flags take precedence.
//!
//! # Exit Codes
//!
//! - 0: Clean shutdown after SIGINT or SIGTERM
//! - 1: Error (invalid configuration, storage could not be opened, bind failed, etc.)

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

use wallet_ledger::api::{self, AppState};
use wallet_ledger::cli::{self, CliArgs};
use wallet_ledger::logging;
use wallet_ledger::SledBalanceStore;

fn main() -> Result<()> {
    let env_loaded = cli::load_env_file(cli::CONFIG_ENV_FILE)
        .with_context(|| format!("failed to load {}", cli::CONFIG_ENV_FILE))?;

    let args = cli::parse_args();
    logging::init_logging(&args.log_level, args.log_format);
    if env_loaded {
        tracing::info!(file = cli::CONFIG_ENV_FILE, "loaded environment file");
    }

    let workers = args.worker_threads();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(serve(args, workers))
}

async fn serve(args: CliArgs, workers: usize) -> Result<()> {
    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!(
            "failed to create data directory: {}",
            args.data_dir.display()
        )
    })?;

    let store = Arc::new(
        SledBalanceStore::open(&args.data_dir, args.to_store_config()).with_context(|| {
            format!("failed to open ledger at {}", args.data_dir.display())
        })?,
    );
    tracing::info!(
        data_dir = %args.data_dir.display(),
        wallets = store.db().wallet_count(),
        "ledger opened"
    );

    let state = AppState::new(
        store.clone(),
        args.to_retry_policy(),
        args.request_timeout(),
    );
    let app = api::create_router(state);

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    tracing::info!(listen = %args.listen, workers, "wallet ledger listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    store.flush().context("failed to flush ledger")?;
    tracing::info!("wallet ledger stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(error = %error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!(error = %error, "failed to install SIGTERM handler");
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

    tracing::info!("shutdown signal received, draining connections");
}
