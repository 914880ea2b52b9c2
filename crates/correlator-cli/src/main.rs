//! correlator-cli: the operational entrypoint. `serve` boots the HTTP API,
//! `migrate` applies pending Diesel migrations without starting the server,
//! and `health` is a one-shot liveness probe against a running instance's
//! database, useful from a deploy script before flipping traffic.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use correlator_api::{build_router, AppState};
use correlator_config::Config;
use correlator_core::LineageStore;
use correlator_store::{build_pool, PgLineageStore, PoolProvider};

#[derive(Parser)]
#[command(name = "correlator", about = "Lineage/test-result correlation service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API server.
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
    /// Check database connectivity and exit non-zero if unreachable.
    Health,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    env_logger::Builder::new().filter_level(log_level_filter(&config)).init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Serve => runtime.block_on(serve(config)),
        Command::Migrate => migrate(&config),
        Command::Health => health(&config),
    }
}

fn log_level_filter(config: &Config) -> log::LevelFilter {
    match config.log_level {
        correlator_config::LogLevel::Debug => log::LevelFilter::Debug,
        correlator_config::LogLevel::Info => log::LevelFilter::Info,
        correlator_config::LogLevel::Warn => log::LevelFilter::Warn,
        correlator_config::LogLevel::Error => log::LevelFilter::Error,
    }
}

async fn serve(config: Config) -> ExitCode {
    let pool = match build_pool(&config.database_url, config.database_min_connections, config.database_max_connections) {
        Ok(p) => p,
        Err(e) => {
            log::error!("failed to build database pool: {e}");
            return ExitCode::FAILURE;
        }
    };
    let store: Arc<PgLineageStore<PoolProvider>> = Arc::new(PgLineageStore::new(PoolProvider { pool }));
    let config = Arc::new(config);
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(store.clone(), store.clone(), store, config.clone());
    let router = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            log::error!("failed to bind {addr}: {e}");
            return ExitCode::FAILURE;
        }
    };
    log::info!("listening on {addr}");

    // The signal future only tells axum to stop accepting new connections and
    // start draining in-flight ones; draining itself has no deadline of its
    // own, so `SERVER_SHUTDOWN_TIMEOUT` is enforced here by racing the whole
    // server task against a timeout that starts once the signal fires.
    let shutdown_timeout = config.shutdown_timeout;
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(shutdown_timeout, server).await {
        Ok(Ok(Ok(()))) => ExitCode::SUCCESS,
        Ok(Ok(Err(e))) => {
            log::error!("server error: {e}");
            ExitCode::FAILURE
        }
        Ok(Err(join_err)) => {
            log::error!("server task panicked: {join_err}");
            ExitCode::FAILURE
        }
        Err(_) => {
            log::error!("graceful shutdown exceeded {shutdown_timeout:?}, forcing exit");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sig.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("received ctrl-c, shutting down"),
        _ = terminate => log::info!("received SIGTERM, shutting down"),
    }
}

fn migrate(config: &Config) -> ExitCode {
    match build_pool(&config.database_url, config.database_min_connections, config.database_max_connections) {
        Ok(_) => {
            log::info!("migrations applied");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("migration failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn health(config: &Config) -> ExitCode {
    let pool = match build_pool(&config.database_url, config.database_min_connections, config.database_max_connections) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("not ready: {e}");
            return ExitCode::FAILURE;
        }
    };
    let store = PgLineageStore::new(PoolProvider { pool });
    match store.health_check() {
        Ok(()) => {
            println!("ready");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("not ready: {e}");
            ExitCode::FAILURE
        }
    }
}
