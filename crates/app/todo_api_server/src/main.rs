//! Todo API server binary.
//!
//! Reads configuration from the environment (and `.env`), migrates the
//! database, starts the session sweeper and serves the HTTP API until
//! Ctrl-C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use todo_api::config::ApiConfig;
use todo_core::auth::queries::PgStore;
use todo_core::auth::service::AuthService;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const DEFAULT_LOG_FILTER: &str = "info,todo_api=debug,todo_core=debug";

/// CLI arguments. Flags override the corresponding environment variables.
#[derive(Parser, Debug)]
#[command(name = "todo_api_server", about = "Todo API server")]
struct Args {
    /// Port to listen on, replacing the port of `BIND_ADDR`.
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL, replacing `DATABASE_URL`.
    #[arg(long)]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_lookup(|key| match key {
        "DATABASE_URL" => args
            .database_url
            .clone()
            .or_else(|| std::env::var(key).ok()),
        _ => std::env::var(key).ok(),
    })?;
    if let Some(port) = args.port {
        let host = config
            .bind_addr
            .rsplit_once(':')
            .map_or("0.0.0.0", |(host, _)| host);
        config.bind_addr = format!("{host}:{port}");
    }

    info!(
        environment = %config.environment,
        bind_addr = %config.bind_addr,
        max_connections = args.max_connections,
        "starting todo_api_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;

    info!("running database migrations");
    todo_api::migrate(&pool).await?;

    let store = Arc::new(PgStore::new(pool.clone()));
    let auth = Arc::new(AuthService::new(&config.auth, store.clone(), store));

    let cancel = CancellationToken::new();
    let sweeper = todo_api::sweeper::start(auth.clone(), config.sweep_interval, cancel.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let state = todo_api::AppState { pool, auth };
    let app = todo_api::router(state);

    info!(addr = %local_addr, "REST API listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        error!(error = %e, "session sweeper task failed");
    }
    info!("server exited");

    result?;
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
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
                error!(error = %e, "failed to install SIGTERM handler");
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

    info!("shutdown signal received, stopping");
    cancel.cancel();
}
