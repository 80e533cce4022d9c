use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    AppState,
    config::TrackerConfig,
    db, routes,
    services::{SessionCleanupConfig, spawn_session_cleanup_service},
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Connect, migrate, and serve until a shutdown signal arrives.
pub async fn run(config: TrackerConfig) -> Result<(), ServerError> {
    info!(
        app = %config.app_name,
        version = %config.app_version,
        debug = config.debug,
        timezone = %config.timezone,
        utc_offset = %config.utc_offset,
        "starting tracker"
    );

    // A lazy pool lets the service come up and report not-ready while the
    // database is unreachable.
    let pool = db::create_lazy_pool(&config.database_url)?;

    match db::ping(&pool).await {
        Ok(()) => {
            info!("database connection established");
            match db::migrate(&pool).await {
                Ok(()) => info!("database migrations applied"),
                Err(e) => error!(error = %e, "failed to run database migrations"),
            }
        }
        Err(e) => warn!(error = %e, "database not reachable at startup"),
    }

    let cleanup = spawn_session_cleanup_service(
        pool.clone(),
        SessionCleanupConfig {
            cleanup_interval: config.session_cleanup_interval,
        },
    );

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(pool.clone(), config);
    let pruner = state.rate_limiter().spawn_pruner(Duration::from_secs(60));
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    cleanup.abort();
    pruner.abort();
    pool.close().await;
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                tracing::error!("Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
