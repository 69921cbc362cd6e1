//! Repair command

use super::{backend, read_file, read_text_arg};
use crate::cli::app::RepairArgs;
use anyhow::{Context, Result};
use sqlforge_core::Config;
use sqlforge_core::synthesis::RepairService;

/// Execute the repair command
pub async fn execute(args: RepairArgs, config: &Config) -> Result<()> {
    let script = read_file(&args.script)?;
    let diagnostic = read_text_arg(&args.error)?;
    if diagnostic.trim().is_empty() {
        anyhow::bail!("the error text is empty");
    }

    let service = RepairService::new(backend(config).await?, config.sampling);
    let outcome = service
        .repair_with_report(&script, &diagnostic)
        .await
        .with_context(|| format!("Failed to repair {}", args.script.display()))?;

    println!("{}", outcome.script);

    if args.diff {
        if outcome.diff.is_empty() {
            eprintln!("(no changes)");
        } else {
            eprint!("{}", outcome.diff.unified);
        }
    }
    Ok(())
}
