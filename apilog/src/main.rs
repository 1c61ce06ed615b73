//! apilog Server Entry Point

use apilog::cli::serve::ServeArgs;
use apilog::cli::{Cli, Commands};
use apilog::config::{get_env_with_fallback_or, get_env_with_fallback_parse};
use apilog::logging;
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init().expect("failed to initialize logging");

    let args = match cli.command {
        Some(Commands::Serve(args)) => args,
        None => {
            // No subcommand - default to serve
            ServeArgs {
                host: get_env_with_fallback_or("APILOG_HOST", "HOST", "0.0.0.0"),
                port: get_env_with_fallback_parse("APILOG_PORT", "PORT", 8080),
                database_url: None,
            }
        }
    };

    if let Err(e) = apilog::cli::serve::execute(&args).await {
        tracing::error!("apilog server failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
