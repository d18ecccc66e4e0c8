//! shotlift command-line uploader.

mod cli;
mod commands;
mod config;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the uploaded URL.
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting shotlift");

    match cli.command {
        Command::Config(command) => commands::config(command),
        Command::Upload(args) => {
            let config = config::Config::load()?;
            tracing::debug!(endpoint = %config.server_endpoint, "configuration loaded");

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::upload(args, config))
        }
    }
}
