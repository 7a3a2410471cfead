//! grid-intensity - Carbon intensity of electricity grids
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use grid_intensity::cli::{commands, Cli, Commands};
use grid_intensity::config::ConfigManager;
use grid_intensity::error::GridResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> GridResult<()> {
    let cli = Cli::parse();

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("grid_intensity=warn"),
        1 => EnvFilter::new("grid_intensity=info"),
        _ => EnvFilter::new("grid_intensity=debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }

    let manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = manager.load().await?;

    match cli.command {
        Commands::Get(args) => commands::get(args, &config, &manager).await,
        Commands::Provider(args) => commands::provider(args).await,
        Commands::Config(args) => commands::config(args, &config, &manager).await,
        Commands::Cache(args) => commands::cache(args, &config).await,
        Commands::Exporter(args) => commands::exporter(args, &config).await,
    }
}
