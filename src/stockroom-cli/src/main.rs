//! Stockroom command-line client.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use stockroom_cli::{App, ClientConfig, Command, TerminalUi};

/// Stockroom inventory client
#[derive(Parser)]
#[command(name = "stockroom")]
#[command(about = "Command-line client for the Stockroom inventory server")]
#[command(version)]
struct Args {
    /// Configuration file path (defaults to ~/.stockroom/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server root URL
    #[arg(long)]
    base_url: Option<String>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::load_default()?,
    };
    config.apply_env()?;
    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let ui = Arc::new(TerminalUi::stderr());
    let app = match App::new(config, ui) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = std::io::stdout();
    match app.run(args.command, &mut stdout).await {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
