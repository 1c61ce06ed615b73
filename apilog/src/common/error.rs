//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! ログパイプラインで発生したエラーはHTTP呼び出し元には決して返さない。
//! 各バリアントはログエントリ単位で終端し、`tracing` と `WriterStats` で観測する。

use thiserror::Error;

/// traffic logging error type
#[derive(Debug, Error)]
pub enum ApiLogError {
    /// Request/response capture error (malformed or non-text body, unreadable headers)
    #[error("Capture error: {0}")]
    Capture(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Timeout error
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiLogError {
    /// 永続化失敗として扱うエラーか
    ///
    /// `Database` と `Timeout` はストア側の障害を示す。
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Timeout(_))
    }
}

impl From<sqlx::Error> for ApiLogError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type alias for the traffic logging pipeline
pub type ApiLogResult<T> = Result<T, ApiLogError>;
