// vellum: page snapshots and recovery for a remote document workspace.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vellum_core::VaultConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "vellum",
    version,
    about = "Capture, retain and restore page snapshots"
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, env = "VELLUM_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: commands::Command,
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = VaultConfig::resolve(cli.config.as_deref()).context("loading configuration")?;
    commands::run(cli.command, config, cli.json).await
}
