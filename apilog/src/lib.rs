//! apilog
//!
//! HTTP APIのリクエスト/レスポンスを相関IDつきで記録するトラフィックログ

#![warn(missing_docs)]

/// 共通型定義（エラー、IP解決）
pub mod common;

/// REST APIハンドラー（サンプルホスト）
pub mod api;

/// データベースアクセス
pub mod db;

/// ロギング初期化ユーティリティ
pub mod logging;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// CLIインターフェース
pub mod cli;

/// トラフィックログ（キャプチャ・永続化）
pub mod traffic;

/// axumサーバー起動・シャットダウン
pub mod server;

/// Cooperative shutdown controller
pub mod shutdown;

use std::sync::Arc;

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// トラフィックログミドルウェアの状態
    pub traffic_logger: traffic::TrafficLogger,

    /// Cooperative shutdown controller
    pub shutdown: shutdown::ShutdownController,
}

impl AppState {
    /// 設定からストレージ・ライター・ミドルウェア状態を組み立てる
    pub fn new(db_pool: sqlx::SqlitePool, config: config::TrafficLogConfig) -> Self {
        let storage = Arc::new(db::logs::LogStorage::new(db_pool));
        let writer = traffic::LogWriter::new(storage, config.writer);
        Self {
            traffic_logger: traffic::TrafficLogger::new(writer, config.capture),
            shutdown: shutdown::ShutdownController::default(),
        }
    }
}
