//! トラフィックログストレージ

use crate::common::error::{ApiLogError, ApiLogResult};
use crate::db::traits::LogSink;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// `logs` テーブルへの書き込み
#[derive(Clone)]
pub struct LogStorage {
    pool: SqlitePool,
}

impl LogStorage {
    /// 新しいストレージインスタンスを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 1件挿入する
    pub async fn insert(
        &self,
        reference_id: Uuid,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> ApiLogResult<()> {
        sqlx::query("INSERT INTO logs (LogContent, ReferenceId, CreationDate) VALUES (?, ?, ?)")
            .bind(content)
            .bind(reference_id.to_string())
            .bind(created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| ApiLogError::Database(format!("Failed to insert log: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl LogSink for LogStorage {
    async fn persist(
        &self,
        reference_id: Uuid,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> ApiLogResult<()> {
        self.insert(reference_id, content, created_at).await
    }
}
