//! Server startup and graceful shutdown

use crate::state::AppState;
use anyhow::Result;
use axum::Router;
use sportisode_core::Config;
use std::sync::Arc;
use std::time::Duration;

/// Running transcodes get this long to finish once the listener has stopped
const TRANSCODE_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Start the server with graceful shutdown
pub async fn start_server(config: &Config, state: Arc<AppState>, app: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port());
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let media = config.media();
    tracing::info!(
        max_image_mb = media.max_image_size_bytes / 1024 / 1024,
        max_video_mb = media.max_video_size_bytes / 1024 / 1024,
        image_types = %media.allowed_image_content_types.join(","),
        video_types = %media.allowed_video_content_types.join(","),
        ffmpeg_path = %media.ffmpeg_path,
        max_concurrent_transcodes = config.max_concurrent_transcodes(),
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(
        in_flight = state.media.queue.in_flight(),
        "Draining transcode queue"
    );
    state.media.queue.shutdown(TRANSCODE_SHUTDOWN_GRACE).await;
    sportisode_infra::shutdown_telemetry().await;

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. If a handler cannot be installed that
/// signal is never observed; the other one still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
