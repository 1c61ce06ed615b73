//! Repository traitパターン定義
//!
//! 永続化先を抽象化し、ライターを任意のストアやテスト用シンクで動かせるようにする。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::common::error::ApiLogResult;

/// シリアライズ済みログの書き込み先
///
/// 複数ワーカーから同時に呼ばれるため `Send + Sync` を要求する。
#[async_trait]
pub trait LogSink: Send + Sync {
    /// 1件のログを相関IDと作成時刻つきで書き込む
    async fn persist(
        &self,
        reference_id: Uuid,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> ApiLogResult<()>;
}
