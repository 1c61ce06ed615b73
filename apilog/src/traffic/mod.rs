//! HTTPトラフィックログ
//!
//! リクエスト/レスポンスのスナップショットを相関IDつきで取得し、
//! 非同期にストアへ永続化する。ログ側の失敗はHTTP呼び出し元に伝播しない。

/// エントリ組み立て
pub mod capture;

/// ヘッダー正規化
pub mod headers;

/// axumミドルウェア
pub mod middleware;

/// JSONシリアライズ
pub mod serializer;

/// 型定義
pub mod types;

/// 非同期ライター
pub mod writer;

pub use middleware::{traffic_log_middleware, TrafficLogger};
pub use types::{Identity, LogEntry, PersistOutcome};
pub use writer::{LogWriter, LogWriterConfig, WriterStatsSnapshot};
