//! データベースアクセス層
//!
//! SQLiteベースのトラフィックログ永続化

/// データベース接続・マイグレーション
pub mod migrations;

/// トラフィックログストレージ
pub mod logs;

/// Repository traitパターン（テスタビリティ向上）
pub mod traits;

pub use migrations::initialize_database;
