//! ロギング初期化ユーティリティ
//!
//! `APILOG_LOG_LEVEL`（フォールバック `RUST_LOG`）でフィルタを、
//! `APILOG_LOG_FORMAT=json` で構造化JSON出力を選択する。

use crate::common::error::{ApiLogError, ApiLogResult};
use crate::config::{get_env_with_fallback, get_env_with_fallback_or};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_LEVEL: &str = "info";

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 人間向けテキスト
    Text,
    /// 1行1JSON
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match get_env_with_fallback("APILOG_LOG_FORMAT", "LOG_FORMAT") {
            Some(value) if value.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

fn build_filter() -> EnvFilter {
    let directives = get_env_with_fallback_or("APILOG_LOG_LEVEL", "RUST_LOG", DEFAULT_LOG_LEVEL);
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// グローバルsubscriberをインストールする
///
/// 二重に呼ばれた場合はエラーを返す。
pub fn init() -> ApiLogResult<()> {
    let registry = tracing_subscriber::registry().with(build_filter());

    let result = match LogFormat::from_env() {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };

    result.map_err(|e| ApiLogError::Internal(format!("failed to install subscriber: {}", e)))
}
