//! thinkstream CLI binary entry point.

use clap::Parser;
use thinkstream::cli::{chat::handle_chat, Cli, Commands};
use thinkstream::config::ThinkstreamConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("THINKSTREAM_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ThinkstreamConfig::from_file(path).and_then(ThinkstreamConfig::with_env),
        None => ThinkstreamConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Chat(chat_args) => handle_chat(chat_args, config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
