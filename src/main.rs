//! CLI entry point for rangefetch.

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

mod app_config;
mod cli;
mod commands;

use app_config::load_default_file_config;
use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = load_default_file_config()?;
    match (&loaded.path, &loaded.config) {
        (Some(path), Some(_)) => info!(path = %path.display(), "loaded config file"),
        (Some(path), None) => debug!(path = %path.display(), "no config file, using defaults"),
        (None, _) => debug!("config path unresolved, using defaults"),
    }
    let file_config = loaded.config.as_ref();

    match args.command {
        Command::Get(get) => commands::run_get_command(get, args.quiet, file_config).await,
        Command::Probe(probe) => commands::run_probe_command(probe, file_config).await,
    }
}
