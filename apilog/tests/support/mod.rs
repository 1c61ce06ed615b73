//! 統合テスト共通ユーティリティ
//!
//! テスト用シンク、アプリケーション状態の組み立て、リクエスト送信ヘルパー

#![allow(dead_code)]

use apilog::common::error::{ApiLogError, ApiLogResult};
use apilog::config::CaptureConfig;
use apilog::db::traits::LogSink;
use apilog::traffic::serializer::parse_entry;
use apilog::traffic::types::ProcessInfo;
use apilog::traffic::{LogEntry, LogWriter, LogWriterConfig, TrafficLogger};
use apilog::AppState;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

/// 書き込まれた内容をメモリに保持するシンク
#[derive(Default)]
pub struct MemorySink {
    rows: Mutex<Vec<(Uuid, String)>>,
}

impl MemorySink {
    /// 書き込まれた行（相関ID, JSON）
    pub async fn rows(&self) -> Vec<(Uuid, String)> {
        self.rows.lock().await.clone()
    }

    /// 書き込まれたエントリをパースして返す
    pub async fn entries(&self) -> Vec<LogEntry> {
        self.rows
            .lock()
            .await
            .iter()
            .map(|(_, content)| parse_entry(content).expect("persisted content should parse"))
            .collect()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn persist(
        &self,
        reference_id: Uuid,
        content: &str,
        _created_at: DateTime<Utc>,
    ) -> ApiLogResult<()> {
        self.rows
            .lock()
            .await
            .push((reference_id, content.to_string()));
        Ok(())
    }
}

/// 常に失敗するシンク
pub struct FailingSink;

#[async_trait]
impl LogSink for FailingSink {
    async fn persist(&self, _: Uuid, _: &str, _: DateTime<Utc>) -> ApiLogResult<()> {
        Err(ApiLogError::Database("database is locked".to_string()))
    }
}

/// テスト用ライター設定
pub fn writer_config(queue_capacity: usize) -> LogWriterConfig {
    LogWriterConfig {
        queue_capacity,
        workers: 2,
        drain_timeout: Duration::from_secs(10),
        write_timeout: Duration::from_secs(5),
    }
}

/// テスト用のSQLiteファイルDBを作成する
///
/// `TempDir` がドロップされるとファイルも消えるため、テスト中は保持すること。
pub async fn create_test_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite:{}", dir.path().join("apilog.db").display());
    let pool = apilog::db::initialize_database(&url)
        .await
        .expect("Failed to initialize test database");
    (pool, dir)
}

/// 任意のシンクを使うアプリケーション状態を作成する
pub fn state_with_sink(sink: Arc<dyn LogSink>, queue_capacity: usize) -> AppState {
    let writer = LogWriter::new(sink, writer_config(queue_capacity));
    let traffic_logger = TrafficLogger::with_process(
        writer,
        CaptureConfig::default(),
        ProcessInfo {
            application: "WebAPI".to_string(),
            machine: "integration-host".to_string(),
        },
    );
    AppState {
        traffic_logger,
        shutdown: apilog::shutdown::ShutdownController::default(),
    }
}

/// リクエストを1件送信する
pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone()
        .oneshot(request)
        .await
        .expect("router should not fail")
}

/// レスポンスボディを読み切る
pub async fn body_bytes(response: Response) -> axum::body::Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable")
}
