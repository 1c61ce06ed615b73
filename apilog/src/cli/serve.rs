//! serve サブコマンド
//!
//! トラフィックログ付きのAPIサーバーを起動します。

use crate::common::error::ApiLogResult;
use crate::config::TrafficLogConfig;
use crate::AppState;
use clap::Args;
use tracing::info;

/// serve サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Listen port
    #[arg(short, long, default_value = "8080", env = "APILOG_PORT")]
    pub port: u16,

    /// Bind address
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "APILOG_HOST")]
    pub host: String,

    /// Log store URL (overrides APILOG_DATABASE_URL / DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,
}

impl ServeArgs {
    /// バインドアドレス
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// サーバーを起動し、停止まで待機する
pub async fn execute(args: &ServeArgs) -> ApiLogResult<()> {
    let mut config = TrafficLogConfig::from_env();
    if let Some(url) = &args.database_url {
        config.database_url = url.clone();
    }

    info!(
        database_url = %config.database_url,
        application = %config.capture.application,
        queue_capacity = config.writer.queue_capacity,
        workers = config.writer.workers,
        "Initializing traffic log store"
    );
    let pool = crate::db::initialize_database(&config.database_url).await?;
    let state = AppState::new(pool, config);

    crate::server::run(state, &args.bind_addr()).await
}
