//! Configuration management via environment variables
//!
//! Provides helper functions for reading environment variables with a
//! fallback name, and the configuration values injected into the traffic
//! logging pipeline at construction time.

use crate::traffic::writer::LogWriterConfig;

/// Default store endpoint (SQLite file in the working directory)
pub const DEFAULT_DATABASE_URL: &str = "sqlite:apilog.db?mode=rwc";

/// Default application descriptor recorded in every log entry
pub const DEFAULT_APPLICATION: &str = "WebAPI";

/// Default upper bound for captured request/response bodies (1 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Get an environment variable with fallback to a secondary name
///
/// If the primary variable name is set, returns its value.
/// If only the fallback variable name is set, returns its value
/// and logs which name was used.
///
/// # Example
/// ```
/// use apilog::config::get_env_with_fallback;
///
/// let url = get_env_with_fallback("APILOG_DATABASE_URL", "DATABASE_URL");
/// ```
pub fn get_env_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    if let Ok(val) = std::env::var(primary) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(fallback) {
        tracing::debug!(
            "Environment variable '{}' is not set, using '{}' instead",
            primary,
            fallback
        );
        return Some(val);
    }
    None
}

/// Get an environment variable with fallback and default value
pub fn get_env_with_fallback_or(primary: &str, fallback: &str, default: &str) -> String {
    get_env_with_fallback(primary, fallback).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable with fallback, parsing to a specific type
///
/// Returns `default` if neither is set or the value fails to parse.
pub fn get_env_with_fallback_parse<T: std::str::FromStr>(
    primary: &str,
    fallback: &str,
    default: T,
) -> T {
    match get_env_with_fallback(primary, fallback) {
        Some(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(
                    "Environment variable '{}' has an invalid value '{}', using default",
                    primary,
                    raw
                );
                default
            }
        },
        None => default,
    }
}

/// キャプチャ設定
///
/// ミドルウェアがリクエストごとに参照する不変設定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// ログに記録するアプリケーション名
    pub application: String,
    /// キャプチャ対象外のパス（末尾 `/` はプレフィックス一致）
    pub excluded_paths: Vec<String>,
    /// キャプチャするボディの上限バイト数
    pub max_body_bytes: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            application: DEFAULT_APPLICATION.to_string(),
            excluded_paths: vec!["/health".to_string()],
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl CaptureConfig {
    /// 環境変数から読み込む
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let application =
            get_env_with_fallback_or("APILOG_APPLICATION", "APILOG_APP_NAME", DEFAULT_APPLICATION);
        let excluded_paths = get_env_with_fallback("APILOG_EXCLUDE_PATHS", "APILOG_EXCLUDED_PATHS")
            .map(|raw| parse_path_list(&raw))
            .unwrap_or(defaults.excluded_paths);
        let max_body_bytes = get_env_with_fallback_parse(
            "APILOG_MAX_BODY_BYTES",
            "APILOG_MAX_BODY_SIZE",
            DEFAULT_MAX_BODY_BYTES,
        );

        Self {
            application,
            excluded_paths,
            max_body_bytes,
        }
    }

    /// キャプチャ対象外のパスか判定する
    pub fn should_exclude(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|excluded| {
            if excluded.ends_with('/') {
                path.starts_with(excluded.as_str()) || path == excluded.trim_end_matches('/')
            } else {
                path == excluded
            }
        })
    }
}

/// トラフィックログ全体の設定
#[derive(Debug, Clone)]
pub struct TrafficLogConfig {
    /// 永続化先ストアの接続URL
    pub database_url: String,
    /// キャプチャ設定
    pub capture: CaptureConfig,
    /// 非同期ライター設定
    pub writer: LogWriterConfig,
}

impl TrafficLogConfig {
    /// 環境変数から読み込む
    pub fn from_env() -> Self {
        Self {
            database_url: get_env_with_fallback_or(
                "APILOG_DATABASE_URL",
                "DATABASE_URL",
                DEFAULT_DATABASE_URL,
            ),
            capture: CaptureConfig::from_env(),
            writer: LogWriterConfig::from_env(),
        }
    }
}

fn parse_path_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
