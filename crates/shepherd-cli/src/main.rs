use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod console;
mod logger;

#[cfg(not(unix))]
compile_error!("shepherd signals process groups and only supports unix targets");

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,shepherd_core=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = config::Cli::parse();

    match cli.command {
        config::Commands::Run { file, processes } => commands::run::run(file, processes).await,
        config::Commands::Check { file } => commands::check::check(file),
    }
}
