//! Process entry point (SPEC_FULL.md §10.L): parses CLI arguments, installs
//! the logging subscriber, loads and validates configuration, builds the
//! `AppState`, and runs the listener until a shutdown signal arrives.

use std::process::ExitCode;
use std::sync::Arc;

use causeway_proxy::app::AppState;
use causeway_proxy::config::Config;
use causeway_proxy::server;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "causeway", about = "Configurable HTTP reverse proxy and API gateway")]
struct Args {
    /// Path to the proxy's JSON or YAML config document.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: String,

    /// Tracing filter directive (e.g. "info", "causeway_proxy=debug").
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    /// Load and validate configuration, then exit without binding a listener.
    #[arg(long)]
    check: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.check {
        println!("configuration is valid");
        return ExitCode::SUCCESS;
    }

    let state = match AppState::build(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            eprintln!("failed to build proxy state: {e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(state.config.server.workers.max(1))
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(state))
}

async fn run(state: Arc<AppState>) -> ExitCode {
    tokio::select! {
        result = server::run(state) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server exited with an error");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
            ExitCode::SUCCESS
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
