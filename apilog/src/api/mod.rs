//! REST APIルーター
//!
//! トラフィックログミドルウェアを適用したサンプルAPI。

/// サンプルリソース
pub mod items;

/// ヘルスチェック・カウンター
pub mod system;

use crate::traffic::traffic_log_middleware;
use crate::AppState;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// アプリケーションルーターを構築する
pub fn create_app(state: AppState) -> Router {
    let traffic_logger = state.traffic_logger.clone();

    Router::new()
        .route("/api/echo", post(items::echo))
        .route("/api/items/:id", get(items::get_item))
        .route("/api/traffic/stats", get(system::traffic_stats))
        .route("/health", get(system::health))
        .layer(axum_middleware::from_fn_with_state(
            traffic_logger,
            traffic_log_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
