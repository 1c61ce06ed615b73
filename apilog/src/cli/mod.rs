//! CLI module for apilog
//!
//! Provides command-line interface for the traffic logging host.

/// serve サブコマンド
pub mod serve;

use clap::{Parser, Subcommand};

/// apilog - HTTP traffic logging for axum APIs
#[derive(Parser, Debug)]
#[command(name = "apilog")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    APILOG_HOST                 Bind address (default: 0.0.0.0)
    APILOG_PORT                 Listen port (default: 8080)
    APILOG_DATABASE_URL         Log store URL (default: sqlite:apilog.db?mode=rwc)
    APILOG_LOG_LEVEL            Log level (default: info)
    APILOG_LOG_FORMAT           Log format: text or json (default: text)
    APILOG_APPLICATION          Application name recorded in logs (default: WebAPI)
    APILOG_EXCLUDE_PATHS        Comma-separated paths not logged (default: /health)
    APILOG_MAX_BODY_BYTES       Max captured body size (default: 1048576)
    APILOG_QUEUE_CAPACITY       Writer queue capacity (default: 10000)
    APILOG_WORKERS              Writer worker count (default: 2)
    APILOG_DRAIN_TIMEOUT_SECS   Shutdown drain window (default: 5)
    APILOG_WRITE_TIMEOUT_SECS   Per-entry write timeout (default: 10)
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the API server with traffic logging
    Serve(serve::ServeArgs),
}
