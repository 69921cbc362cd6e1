//! Normalize command

use super::{read_file, read_stdin};
use crate::cli::app::NormalizeArgs;
use anyhow::Result;
use sqlforge_core::synthesis::{extract_script, normalize_with_report};

/// Execute the normalize command
pub fn execute(args: NormalizeArgs) -> Result<()> {
    let raw = match &args.input {
        Some(path) => read_file(path)?,
        None => read_stdin()?,
    };

    let report = normalize_with_report(&extract_script(&raw), &args.destination);

    if args.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.script);
    }
    Ok(())
}
