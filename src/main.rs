//! Svar CLI entry point.

use anyhow::Result;
use clap::Parser;
use svar::cli::{commands, Cli, Commands};
use svar::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("svar={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = Settings::load_from(cli.config.as_ref())?;

    // Ensure data directory exists
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Ingest { key, file, title } => {
            commands::run_ingest(key, file, title.as_deref(), settings).await?;
        }

        Commands::Approve { keys } => {
            commands::run_approve(keys, settings).await?;
        }

        Commands::Ask { key, question, retrieval, json } => {
            commands::run_ask(key, question, retrieval, *json, settings).await?;
        }

        Commands::Search { key, query, retrieval } => {
            commands::run_search(key, query, retrieval, settings).await?;
        }

        Commands::Chat { key } => {
            commands::run_chat(key, settings).await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Delete { key } => {
            commands::run_delete(key, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, cli.config.clone())?;
        }
    }

    Ok(())
}
