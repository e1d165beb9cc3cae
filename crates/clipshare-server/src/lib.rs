//! clipshare-server: HTTP API, clip registry, and expiration sweeper.
//!
//! This crate ties the core types and the extraction runner into a running
//! server. It provides:
//!
//! - Axum-based HTTP API for creating clips and streaming them back
//! - In-memory clip registry keyed by token
//! - Background sweeper that deletes expired clips
//! - Graceful shutdown via signal handling

pub mod clips;
pub mod context;
pub mod error;
pub mod middleware;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod routes;
pub mod sweeper;

use std::net::SocketAddr;
use std::time::Duration;

use clipshare_av::{ClipExtractor, ToolRegistry, WorkDir};
use clipshare_core::config::Config;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Start the clipshare server.
///
/// Resolves the clip directory, discovers ffmpeg, builds the [`AppContext`],
/// and runs the HTTP server and the sweeper until a shutdown signal arrives.
pub async fn start(config: Config) -> clipshare_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let work_dir = WorkDir::resolve(&config.clips.resolved_candidates())?;

    // Discover external tools.
    let tools = ToolRegistry::discover(&config.tools);
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}; clip creation will fail", info.name);
        }
    }
    let extractor = ClipExtractor::from_registry(
        &tools,
        Duration::from_secs(config.tools.extraction_timeout_secs),
    );
    tracing::info!(
        ffmpeg = %extractor.ffmpeg().display(),
        timeout_secs = extractor.timeout().as_secs(),
        "Clip extractor ready"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| clipshare_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::new(config, extractor, work_dir);

    // Cancellation token for graceful shutdown.
    let cancel = CancellationToken::new();
    let sweeper_handle = spawn_sweeper(&ctx, cancel.clone());

    let app = router::build_router(ctx);

    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| clipshare_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;

    // Signal background tasks to stop, then wait for them.
    cancel.cancel();
    let _ = sweeper_handle.await;

    served.map_err(|source| clipshare_core::Error::Io { source })?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Spawn the expiration sweeper for `ctx` on the configured interval.
pub fn spawn_sweeper(ctx: &AppContext, cancel: CancellationToken) -> JoinHandle<()> {
    let period = Duration::from_secs(ctx.config.clips.sweep_interval_secs);
    tokio::spawn(sweeper::run_sweeper(
        ctx.registry.clone(),
        ctx.clock.clone(),
        period,
        cancel,
    ))
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
