//! Classify command

use super::read_text_arg;
use crate::cli::app::ClassifyArgs;
use anyhow::Result;
use sqlforge_core::synthesis::classify;

/// Execute the classify command
pub fn execute(args: ClassifyArgs) -> Result<()> {
    let diagnostic = read_text_arg(&args.error)?;
    let diagnosis = classify(diagnostic.trim());
    println!("{}", serde_json::to_string_pretty(&diagnosis)?);
    Ok(())
}
