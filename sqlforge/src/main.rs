use anyhow::Result;
use clap::Parser;
use sqlforge_core::Config;
use std::path::Path;
use tracing::info;

mod cli;
mod telemetry;

use cli::{Cli, Commands, commands};
use telemetry::Telemetry;

fn main() -> Result<()> {
    // Parse CLI arguments first to get verbosity level
    let cli = Cli::parse();
    let _telemetry = Telemetry::init(cli.verbose);

    match cli.command {
        Commands::Synthesize(args) => {
            let config = load_config(cli.config.as_deref())?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::synthesize::execute(args, &config))?;
        }
        Commands::Repair(args) => {
            let config = load_config(cli.config.as_deref())?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::repair::execute(args, &config))?;
        }
        Commands::Transform(args) => {
            let config = load_config(cli.config.as_deref())?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::transform::execute(args, &config))?;
        }
        Commands::Classify(args) => commands::classify::execute(args)?,
        Commands::Normalize(args) => commands::normalize::execute(args)?,
        Commands::Init(args) => commands::init::execute(args)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path)?;
    info!("Backend: {} ({})", config.backend.provider, config.backend.model);
    Ok(config)
}
