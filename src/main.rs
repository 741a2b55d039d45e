//! CLI entry point for bookcourier.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{BufReader, stdin, stdout};
use tracing::{debug, info};

use bookcourier_core::{Courier, SearchClient};

mod app;
mod cli;

use app::commands;
use app::config::Settings;
use app::rpc::ToolServer;
use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));

    // stdout is reserved for command output and JSON-RPC responses
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let settings = Settings::load().context("Failed to load settings")?;

    match args.command {
        Command::Search { term, format, json } => {
            commands::search(&settings, &term, format.as_deref(), json).await
        }
        Command::Download { hash, filename } => {
            commands::download(&settings, &hash, &filename).await
        }
        Command::TestEmail => commands::test_email(&settings).await,
        Command::Mcp => serve_tools(&settings).await,
    }
}

async fn serve_tools(settings: &Settings) -> Result<()> {
    let search = SearchClient::with_base_url(&settings.base_url)
        .context("Failed to build search client")?;
    let courier = Courier::new(settings.delivery_config(), &settings.base_url)
        .context("Failed to build delivery courier")?;
    let sweeper = courier.suppression().spawn_sweeper();

    info!(base_url = %settings.base_url, "serving tools over stdio");
    let server = ToolServer::new(search, courier);
    let result = server.serve(BufReader::new(stdin()), stdout()).await;
    sweeper.abort();
    result
}
