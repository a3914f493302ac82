//! HTTP server: router, handlers and the background purge task.

pub mod context;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

pub use context::AppContext;
pub use error::AppError;
pub use router::build_router;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use sharegate_db::ShareStore;
use tokio::signal;
use tokio::task::JoinHandle;

use crate::config::Config;

/// Start the HTTP server and run until a shutdown signal arrives.
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let store = ShareStore::open(&config.server.db_path)
        .with_context(|| format!("Failed to open share database {}", config.server.db_path))?;

    if !config.server.auth.enabled {
        tracing::warn!("Admin authentication is disabled; anyone can manage shares");
    }
    if config.scene_server.is_none() && config.library_server.is_none() {
        tracing::warn!("No origin server configured; shares cannot be created");
    }

    let ctx = AppContext::new(config, store);
    let purge = start_purge_task(
        ctx.clone(),
        Duration::from_secs(ctx.config.proxy.purge_interval_secs),
    );

    let app = build_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(handle) = purge {
        handle.abort();
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Spawn the periodic purge of dead shares. A zero interval disables it.
pub fn start_purge_task(ctx: AppContext, interval: Duration) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        tracing::info!("Periodic share purge disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            purge_once(&ctx).await;
        }
    }))
}

/// Delete every dead share and drop its cached playlists.
pub async fn purge_once(ctx: &AppContext) -> usize {
    match ctx.store.purge_dead(Utc::now()).await {
        Ok(tokens) => {
            ctx.playlists.forget_many(&tokens);
            ctx.playlists.cleanup();
            if !tokens.is_empty() {
                tracing::info!(count = tokens.len(), "Purged dead shares");
            }
            tokens.len()
        }
        Err(e) => {
            tracing::error!("Share purge failed: {}", e);
            0
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}
