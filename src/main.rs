use anyhow::Context;
use review_assigner::config::Config;
use review_assigner::db;
use review_assigner::services::http_server::{build_router, serve};
use review_assigner::services::{ApiState, ReviewWorkflow};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,review_assigner=debug")),
        )
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    let addr = config.bind_addr()?;

    let pool = db::initialize_with(&config.db_path, &config.pool_settings())
        .await
        .with_context(|| format!("Failed to initialize database at {}", config.db_path.display()))?;

    let shutdown = CancellationToken::new();
    let state = ApiState {
        workflow: Arc::new(ReviewWorkflow::new(pool.clone())),
        shutdown: shutdown.clone(),
    };
    let router = build_router(state, config.request_timeout);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    serve(listener, router, shutdown).await?;
    pool.close().await;
    Ok(())
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
async fn shutdown_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
