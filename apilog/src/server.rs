//! axumサーバー起動・シャットダウンハンドリング

use crate::common::error::{ApiLogError, ApiLogResult};
use crate::shutdown::ShutdownController;
use crate::AppState;
use std::net::SocketAddr;
use tracing::info;

/// axumサーバーを起動し、シャットダウンシグナルを待機する
///
/// 停止後はトラフィックログライターをドレインしてから戻る。
pub async fn run(state: AppState, bind_addr: &str) -> ApiLogResult<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| ApiLogError::Config(format!("Failed to bind to {}: {}", bind_addr, e)))?;

    info!("apilog server listening on {}", bind_addr);
    serve(state, listener).await
}

/// バインド済みリスナーでサーブする
pub async fn serve(state: AppState, listener: tokio::net::TcpListener) -> ApiLogResult<()> {
    let shutdown = state.shutdown.clone();
    let writer = state.traffic_logger.writer().clone();

    let app = crate::api::create_app(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await
    .map_err(|e| ApiLogError::Internal(format!("Server error: {}", e)))?;

    writer.shutdown().await;
    info!(
        stats = ?writer.stats().snapshot(),
        "Server shutdown complete"
    );
    Ok(())
}

/// シャットダウンシグナルを待機
async fn shutdown_signal(shutdown: ShutdownController) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {}", e);
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
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = shutdown.wait() => {
            info!("Shutdown requested, shutting down...");
        }
    }
}
